//! error.rs — Erreurs internes du moteur de hook
//!
//! Celles-ci ne traversent jamais la frontière FFI : chaque étape faillible
//! du reste de cette crate préfère une simple `Option` au site d'appel (une
//! frame manquante est banale, pas exceptionnelle). `HookError` existe pour
//! la poignée de sites d'appel de `hook-abi` qui veulent une raison à logguer
//! en `debug` avant de retomber sur le même comportement no-op silencieux.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HookError {
    #[error("call-info pointer at offset {offset:#x} was null or unreadable")]
    NullCallInfo { offset: usize },

    #[error("unrecognised closure type tag {tag:#x} (expected scripted closure tag 6)")]
    NotAScriptedClosure { tag: u8 },

    #[error("source name pointer at {addr:#x} could not be read")]
    UnreadableSourceName { addr: usize },

    #[error("generic-dialect offsets are all zero; no breakpoints or steps can resolve")]
    GenericOffsetsUnset,

    #[error("async-break mailbox data list overran its 1024-word capacity")]
    MailboxOverrun,
}

pub type HookResult<T> = Result<T, HookError>;
