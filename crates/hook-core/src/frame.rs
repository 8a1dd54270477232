//! frame.rs — Décodage de la frame active (spec.md §4.1, étape 1)
//!
//! Reflète ce que `original_source/LuaDebugHelper_x86/dllmain.cpp` fait en
//! ligne au sommet de `LuaHelperHook` :
//!
//! ```cpp
//! if (ar->i_ci && (ar->i_ci->func->tt_ & 0x3f) == 6) {
//!     auto proto = ((LClosure*)ar->i_ci->func->value_.gc)->p;
//!     sourceName = (char*)proto->source + sizeof(TString);
//! }
//! ```
//!
//! exprimé contre [`VmMemoryReader`] plutôt que par poursuite de pointeurs
//! C++ bruts, de sorte que le parcours de pointeurs lui-même soit exercé par
//! de simples tests unitaires.

use crate::descriptor::{EventKind, VmLayoutDescriptor};
use crate::error::HookError;
use crate::reader::VmMemoryReader;

/// Logue au niveau `debug` pourquoi une étape de décodage de frame a
/// abandonné, quand la feature `trace` est activée. Ne change jamais le flot
/// de contrôle — spec.md §7 traite chacun de ces cas comme "ignorer
/// silencieusement", ceci ne fait que rendre la raison observable pour qui a
/// activé le logging.
#[cfg(feature = "trace")]
fn log_decode_note(err: HookError) {
    log::debug!("{err}");
}
#[cfg(not(feature = "trace"))]
fn log_decode_note(_err: HookError) {}

/// Résultat du décodage de la frame d'appel active. Les deux champs sont
/// `None` quand la frame active est native (pas de prototype à rapporter) —
/// le chemin "passer à l'étape 3" de spec.md §4.1 étape 1, qui n'est pas une
/// erreur.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedFrame {
    pub proto: Option<usize>,
    pub source_name: Option<String>,
}

impl DecodedFrame {
    pub fn native() -> Self {
        Self::default()
    }

    pub fn is_native(&self) -> bool {
        self.proto.is_none()
    }
}

/// La paire type-d'événement/ligne-courante que le debug record de chaque
/// dialecte porte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedEvent {
    pub kind: EventKind,
    pub current_line: Option<i32>,
}

/// Décode `{event, currentline}` depuis le debug record à `record_addr`.
/// Renvoie `None` seulement quand le tag d'événement lui-même est illisible
/// ou non reconnu — une condition qui ne devrait pas se produire avec une VM
/// conforme, mais `hook-abi` traite ceci comme n'importe quel autre cas
/// "ignorer silencieusement".
pub fn decode_event(
    record_addr: usize,
    descriptor: &VmLayoutDescriptor,
    reader: &dyn VmMemoryReader,
) -> Option<DecodedEvent> {
    let raw_event = reader.read_i32(record_addr + descriptor.event_offset)?;
    let kind = EventKind::from_raw(raw_event)?;
    let current_line = reader.read_i32(record_addr + descriptor.current_line_offset);
    Some(DecodedEvent { kind, current_line })
}

/// Décode le prototype actuellement exécuté et son nom de source, selon
/// spec.md §4.1 étape 1. `record_addr` est l'adresse du debug record (ce que
/// la VM transmet au hook aux côtés du pointeur opaque d'état VM).
pub fn decode_frame(
    record_addr: usize,
    descriptor: &VmLayoutDescriptor,
    reader: &dyn VmMemoryReader,
) -> DecodedFrame {
    let offset = record_addr + descriptor.call_info_offset;
    let Some(call_info) = reader.read_usize(offset) else {
        log_decode_note(HookError::NullCallInfo { offset });
        return DecodedFrame::native();
    };
    if call_info == 0 {
        log_decode_note(HookError::NullCallInfo { offset });
        return DecodedFrame::native();
    }

    let Some(func) = reader.read_usize(call_info + descriptor.function_offset) else {
        log_decode_note(HookError::NullCallInfo { offset: call_info + descriptor.function_offset });
        return DecodedFrame::native();
    };

    let Some(tag) = reader.read_u8(func + descriptor.type_tag_offset) else {
        log_decode_note(HookError::NullCallInfo { offset: func + descriptor.type_tag_offset });
        return DecodedFrame::native();
    };
    if tag & 0x3f != descriptor.scripted_closure_tag {
        log_decode_note(HookError::NotAScriptedClosure { tag });
        return DecodedFrame::native();
    }

    let Some(closure) = reader.read_usize(func + descriptor.value_offset) else {
        log_decode_note(HookError::NullCallInfo { offset: func + descriptor.value_offset });
        return DecodedFrame::native();
    };
    let Some(proto) = reader.read_usize(closure + descriptor.closure_proto_offset) else {
        log_decode_note(HookError::NullCallInfo { offset: closure + descriptor.closure_proto_offset });
        return DecodedFrame::native();
    };

    let source_name = reader
        .read_usize(proto + descriptor.proto_source_offset)
        .and_then(|source_ptr| reader.read_cstr(source_ptr + descriptor.string_content_offset));
    if source_name.is_none() {
        log_decode_note(HookError::UnreadableSourceName {
            addr: proto + descriptor.proto_source_offset,
        });
    }

    DecodedFrame {
        proto: Some(proto),
        source_name,
    }
}
