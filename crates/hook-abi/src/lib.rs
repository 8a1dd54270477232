//! hook-abi : la charge utile de debugger injectée.
//!
//! C'est le `cdylib` qu'un front-end de debugger externe charge dans un
//! processus où la VM cible est liée. Cette crate porte tout ce que
//! `hook-core` refuse : les lectures de pointeurs bruts dans la mémoire VM
//! ([`reader`]), la surface de symboles exportés à adresse fixe que le
//! debugger résout par nom ([`state`], [`signals`]), les points d'entrée de
//! hook par dialecte que la VM appelle à chaque instruction ([`hooks`]), le
//! thread de sondage d'arrêt asynchrone ([`worker`]), et l'initialisation
//! unique à l'attachement de la bibliothèque ([`attach`]).
//!
//! `hook-core` décide *ce qui s'est passé* ; cette crate n'est responsable
//! que de *faire entrer et sortir les octets* et de ne jamais laisser une
//! panique Rust s'échapper à travers la pile d'appels C de la VM.

pub mod attach;
pub mod hooks;
pub mod reader;
pub mod signals;
pub mod state;
pub mod worker;

pub use hooks::{
    hook_entry_generic, hook_entry_lua51, hook_entry_lua52, hook_entry_lua53, hook_entry_lua54,
    hook_entry_luajit,
};
