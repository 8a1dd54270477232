//! state.rs — la surface de symboles exportés à adresse fixe (spec §6)
//!
//! Chaque élément de ce module est un `#[no_mangle] pub static` exporté sous
//! son nom exact via `#[export_name]` : le debugger résout chacun par nom à
//! travers l'API de symboles de module de l'OS après avoir injecté cette
//! bibliothèque, puis lit et écrit directement la propre mémoire du
//! processus — il n'y a ni RPC, ni appel système, juste une adresse partagée
//! dans un processus sur laquelle deux debuggers séparés (cette charge
//! utile, et le front-end externe qui la sonde) s'accordent par nom.
//! `hook-core` ne voit jamais rien de tout cela directement ; il ne voit que
//! [`hook_core::StepState`], [`hook_core::BreakpointTable`] et
//! [`hook_core::GenericOffsets`] reconstruits à neuf depuis ces statics à
//! chaque invocation de hook (§5 : la table de points d'arrêt et les
//! drapeaux de pas peuvent changer entre deux appels quelconques, donc une
//! copie mise en cache côté Rust deviendrait périmée).
//!
//! Les champs scalaires utilisent `Atomic*` pour que les lectures/écritures
//! soient au moins bien définies au niveau du modèle mémoire de Rust, même
//! si "l'autre écrivain" est un processus étranger, pas un thread Rust — le
//! debugger ne sonde ceux-ci que pendant qu'il a arrêté le thread VM à une
//! fonction de signal, donc en pratique il n'y a pas de véritable accès
//! concurrent, mais il n'y a aucun moyen d'exprimer cet invariant dans le
//! système de types. Les buffers en masse (la table de points d'arrêt, son
//! magasin de noms de source, les données de la boîte aux lettres
//! asynchrone, le buffer de répertoire de travail) sont plutôt de simples
//! tableaux `static mut` : des atomics par élément ne correspondraient pas à
//! la disposition C plate que le debugger attend quand il lit le symbole
//! comme un seul bloc contigu.

use hook_core::descriptor::GenericOffsets;
use hook_core::{BreakpointEntry, BreakpointTable, StepState};
use std::ptr::addr_of_mut;
use std::sync::atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};

/// Capacité de la table. Reflète [`hook_core::breakpoint::MAX_BREAKPOINTS`].
pub const MAX_BREAKPOINTS: usize = hook_core::breakpoint::MAX_BREAKPOINTS;
/// Octets par emplacement de nom de source inline. Reflète
/// [`hook_core::breakpoint::MAX_SOURCE_NAME_LEN`] plus le terminateur NUL.
pub const SOURCE_SLOT_LEN: usize = hook_core::breakpoint::MAX_SOURCE_NAME_LEN + 1;
/// Capacité du tableau de données de la boîte aux lettres asynchrone.
/// Reflète [`hook_core::mailbox::MAILBOX_DATA_LEN`].
pub const MAILBOX_DATA_LEN: usize = hook_core::mailbox::MAILBOX_DATA_LEN;
/// Taille du buffer scratch de répertoire de travail (spec §6).
pub const WORKING_DIRECTORY_LEN: usize = 1024;

/// Alias d'ordre par défaut utilisé dans tout ce module. Relaxed suffit en
/// pratique (spec §5) : une valeur partiellement publiée échoue simplement à
/// correspondre à ce cycle et correspond au suivant.
const ORD: Ordering = Ordering::Relaxed;

#[export_name = "initialized"]
pub static INITIALIZED: AtomicU8 = AtomicU8::new(0);

#[export_name = "step_in"]
pub static STEP_IN: AtomicU8 = AtomicU8::new(0);
#[export_name = "step_over"]
pub static STEP_OVER: AtomicU8 = AtomicU8::new(0);
#[export_name = "step_out"]
pub static STEP_OUT: AtomicU8 = AtomicU8::new(0);
#[export_name = "skip_depth"]
pub static SKIP_DEPTH: AtomicU32 = AtomicU32::new(0);
#[export_name = "stack_depth_at_call"]
pub static STACK_DEPTH_AT_CALL: AtomicU32 = AtomicU32::new(0);

#[export_name = "async_break_code"]
pub static ASYNC_BREAK_CODE: AtomicU32 = AtomicU32::new(0);

#[export_name = "breakpoint_count"]
pub static BREAKPOINT_COUNT: AtomicU32 = AtomicU32::new(0);

#[export_name = "hit_id"]
pub static HIT_ID: AtomicU32 = AtomicU32::new(0);
#[export_name = "hit_vm_state"]
pub static HIT_VM_STATE: AtomicUsize = AtomicUsize::new(0);

/// Un emplacement brut de table de points d'arrêt, disposé exactement comme
/// spec §6 le décrit : trois mots machine. `source_name` est un pointeur
/// que le debugger peut viser vers [`BREAKPOINT_SOURCES`]`[i]` (ou tout
/// autre endroit lisible) ; `0` signifie "pas de nom de source".
#[repr(C)]
#[derive(Clone, Copy)]
pub struct BreakpointRawEntry {
    pub line: usize,
    pub proto: usize,
    pub source_name: usize,
}

impl BreakpointRawEntry {
    const EMPTY: Self = Self { line: 0, proto: 0, source_name: 0 };
}

#[export_name = "breakpoint_table"]
pub static mut BREAKPOINT_TABLE: [BreakpointRawEntry; MAX_BREAKPOINTS] =
    [BreakpointRawEntry::EMPTY; MAX_BREAKPOINTS];

/// Magasin de noms de source inline vers lequel le debugger peut faire
/// pointer `BREAKPOINT_TABLE[i].source_name` plutôt que vers de la mémoire
/// de tas étrangère.
#[export_name = "breakpoint_sources"]
pub static mut BREAKPOINT_SOURCES: [[u8; SOURCE_SLOT_LEN]; MAX_BREAKPOINTS] =
    [[0u8; SOURCE_SLOT_LEN]; MAX_BREAKPOINTS];

#[export_name = "async_break_data"]
pub static mut ASYNC_BREAK_DATA: [usize; MAILBOX_DATA_LEN] = [0usize; MAILBOX_DATA_LEN];

#[export_name = "working_directory"]
pub static mut WORKING_DIRECTORY: [u8; WORKING_DIRECTORY_LEN] = [0u8; WORKING_DIRECTORY_LEN];

/// Dix mots d'offset exportés pour le dialecte `Generic` (spec §6). Relus à
/// neuf à chaque invocation de hook, jamais mis en cache — le debugger peut
/// encore être en train de les remplir lors des premiers appels.
#[export_name = "generic_event_offset"]
pub static GENERIC_EVENT_OFFSET: AtomicU32 = AtomicU32::new(0);
#[export_name = "generic_current_line_offset"]
pub static GENERIC_CURRENT_LINE_OFFSET: AtomicU32 = AtomicU32::new(0);
#[export_name = "generic_call_info_offset"]
pub static GENERIC_CALL_INFO_OFFSET: AtomicU32 = AtomicU32::new(0);
#[export_name = "generic_function_offset"]
pub static GENERIC_FUNCTION_OFFSET: AtomicU32 = AtomicU32::new(0);
#[export_name = "generic_type_tag_offset"]
pub static GENERIC_TYPE_TAG_OFFSET: AtomicU32 = AtomicU32::new(0);
#[export_name = "generic_value_offset"]
pub static GENERIC_VALUE_OFFSET: AtomicU32 = AtomicU32::new(0);
#[export_name = "generic_closure_proto_offset"]
pub static GENERIC_CLOSURE_PROTO_OFFSET: AtomicU32 = AtomicU32::new(0);
#[export_name = "generic_proto_source_offset"]
pub static GENERIC_PROTO_SOURCE_OFFSET: AtomicU32 = AtomicU32::new(0);
#[export_name = "generic_string_content_offset"]
pub static GENERIC_STRING_CONTENT_OFFSET: AtomicU32 = AtomicU32::new(0);
#[export_name = "generic_scripted_closure_tag"]
pub static GENERIC_SCRIPTED_CLOSURE_TAG: AtomicU32 = AtomicU32::new(0);

/// Adresses des propres fonctions de récupération d'info et de sonde de
/// pile du dialecte JIT, remplies par le debugger avant la première
/// invocation du hook LuaJIT (spec §6).
#[export_name = "jit_get_info_address"]
pub static JIT_GET_INFO_ADDRESS: AtomicUsize = AtomicUsize::new(0);
#[export_name = "jit_get_stack_address"]
pub static JIT_GET_STACK_ADDRESS: AtomicUsize = AtomicUsize::new(0);

/// Instantané des statics d'état de pas dans un [`hook_core::StepState`].
pub fn load_step_state() -> StepState {
    StepState {
        want_in: STEP_IN.load(ORD) != 0,
        want_over: STEP_OVER.load(ORD) != 0,
        want_out: STEP_OUT.load(ORD) != 0,
        skip_depth: SKIP_DEPTH.load(ORD),
        stack_depth_at_call: STACK_DEPTH_AT_CALL.load(ORD),
    }
}

/// Réécrit un [`hook_core::StepState`] dans les statics d'état de pas.
/// `want_in`/`want_over`/`want_out` sont délibérément laissés intacts ici —
/// seuls les champs dérivés du moteur de hook (`skip_depth`,
/// `stack_depth_at_call`) font l'aller-retour à travers le hook ; les
/// drapeaux want- sont à la charge du debugger de poser et d'effacer
/// (spec §4.3 : "le debugger les efface explicitement entre l'arrêt et la
/// reprise").
pub fn store_step_derived(state: &StepState) {
    SKIP_DEPTH.store(state.skip_depth, ORD);
    STACK_DEPTH_AT_CALL.store(state.stack_depth_at_call, ORD);
}

/// Construit le [`GenericOffsets`] de dix mots que le hook générique lit à
/// chaque invocation.
pub fn load_generic_offsets() -> GenericOffsets {
    GenericOffsets {
        event_offset: GENERIC_EVENT_OFFSET.load(ORD),
        current_line_offset: GENERIC_CURRENT_LINE_OFFSET.load(ORD),
        call_info_offset: GENERIC_CALL_INFO_OFFSET.load(ORD),
        function_offset: GENERIC_FUNCTION_OFFSET.load(ORD),
        type_tag_offset: GENERIC_TYPE_TAG_OFFSET.load(ORD),
        value_offset: GENERIC_VALUE_OFFSET.load(ORD),
        closure_proto_offset: GENERIC_CLOSURE_PROTO_OFFSET.load(ORD),
        proto_source_offset: GENERIC_PROTO_SOURCE_OFFSET.load(ORD),
        string_content_offset: GENERIC_STRING_CONTENT_OFFSET.load(ORD),
        scripted_closure_tag: GENERIC_SCRIPTED_CLOSURE_TAG.load(ORD),
    }
}

/// Resynchronise un [`hook_core::BreakpointTable`] depuis le tableau brut
/// exporté (spec §3 : "le debugger écrit toute la table atomiquement en
/// mettant à jour les entrées d'abord et le compteur en dernier ; le hook ne
/// mute jamais la table"). `read_cstr` résout un pointeur `source_name` en
/// chaîne — passé en paramètre plutôt que codé en dur pour que cette
/// fonction reste assez pure pour être testée unitairement contre un fake.
pub fn resync_breakpoint_table(read_cstr: impl Fn(usize) -> Option<String>) -> BreakpointTable {
    let count = (BREAKPOINT_COUNT.load(ORD) as usize).min(MAX_BREAKPOINTS);
    // SAFETY: instantané en lecture seule d'une table que le debugger promet
    // de publier compteur-en-dernier ; une lecture déchirée ici échoue
    // simplement à correspondre à ce cycle (spec §5).
    let raw = unsafe { &*addr_of_mut!(BREAKPOINT_TABLE) };
    let entries = raw[..count]
        .iter()
        .map(|e| BreakpointEntry {
            line: e.line as u32,
            proto: e.proto,
            source_name: if e.source_name == 0 {
                String::new()
            } else {
                read_cstr(e.source_name).unwrap_or_default()
            },
        })
        .collect();
    let mut table = BreakpointTable::new();
    table.set(entries);
    table
}

/// Publie un hit de point d'arrêt (spec §3 : "le hit record et l'appel de
/// signal sont appariés : la fonction de signal n'est invoquée qu'une fois
/// le hit record entièrement écrit").
pub fn publish_hit(hit_id: u32, hit_vm_state: usize) {
    HIT_ID.store(hit_id, ORD);
    HIT_VM_STATE.store(hit_vm_state, ORD);
}

/// Pointeur brut vers le tableau de données de la boîte aux lettres
/// asynchrone, pour le worker et les tests.
pub fn async_break_data_ptr() -> *mut [usize; MAILBOX_DATA_LEN] {
    addr_of_mut!(ASYNC_BREAK_DATA)
}

/// Pointeur brut vers le buffer de répertoire de travail, écrit une fois à
/// l'attachement.
pub fn working_directory_ptr() -> *mut [u8; WORKING_DIRECTORY_LEN] {
    addr_of_mut!(WORKING_DIRECTORY)
}
