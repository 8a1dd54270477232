//! descriptor.rs — Descripteurs de mise en page VM
//!
//! `original_source/LuaDebugHelper_x86/dllmain.cpp` code en dur un seul
//! espace de noms `Lua_5_3` (`TValue`, `CallInfo`, `lua_Debug`, `Proto`,
//! `TString`) et laisse les espaces de noms équivalents pour
//! 5.1/5.2/5.4/LuaJIT comme du copier-coller jamais terminé dans la source
//! conservée. Ce module remplace cette duplication par version par une seule
//! table d'offsets plate et immuable par dialecte, plus une variante
//! [`Generic`] assemblée à l'appel depuis des offsets fournis par le
//! debugger (§6 de la spec : dix mots exportés, "non mis en cache").
//!
//! Les offsets ci-dessous sont la mise en page bien connue des en-têtes
//! publics Lua/LuaJIT correspondants sur un hôte 64 bits (pointeurs 8 octets,
//! alignement naturel des structs) — les mêmes nombres qu'une extension Lua
//! DKM/GDB écrite à la main code en dur par architecture.

use std::fmt;

/// Types d'événements que le contrat de hook de la VM peut délivrer.
/// `COUNT` est listé par exhaustivité (§4.3) même si le contrôleur de pas
/// l'ignore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Call,
    Return,
    Line,
    Count,
    TailCall,
    TailReturn,
}

impl EventKind {
    /// Décode le petit entier que la VM écrit dans le champ événement du
    /// debug record. Tous les dialectes s'accordent sur 0..=4 (les constantes
    /// `LUA_HOOK*` de PUC-Rio Lua) ; `TailReturn` (5) est une extension
    /// propre à un dialecte qu'aucune version de PUC-Rio Lua n'émet — seul un
    /// dialecte hypothétique/générique qui distingue les retours de queue
    /// des retours ordinaires l'utiliserait.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(EventKind::Call),
            1 => Some(EventKind::Return),
            2 => Some(EventKind::Line),
            3 => Some(EventKind::Count),
            4 => Some(EventKind::TailCall),
            5 => Some(EventKind::TailReturn),
            _ => None,
        }
    }
}

/// Un dialecte de VM cible supporté. `Generic` représente tout ce que le
/// debugger décrit via les mots d'offset exportés plutôt qu'une table
/// compilée en dur (§6, §7 : des "offsets génériques manquants" est un état
/// supporté, un no-op silencieux, pas une erreur).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Lua51,
    Lua52,
    Lua53,
    Lua54,
    LuaJit,
    Generic,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Dialect::Lua51 => "lua5.1",
            Dialect::Lua52 => "lua5.2",
            Dialect::Lua53 => "lua5.3",
            Dialect::Lua54 => "lua5.4",
            Dialect::LuaJit => "luajit",
            Dialect::Generic => "generic",
        };
        f.write_str(s)
    }
}

/// Table d'offsets plate pour un dialecte de VM (spec.md §3 "VM-layout
/// descriptor").
///
/// Chaque champ est un offset en octets sauf
/// [`VmLayoutDescriptor::scripted_closure_tag`], qui est la *valeur* du tag
/// de type (masquée aux six bits de poids faible) identifiant une closure
/// scriptée, non native — `6` dans tous les dialectes supportés (spec.md
/// §4.1), conservé comme champ plutôt que constante codée en dur pour que le
/// descripteur générique puisse aussi le surcharger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmLayoutDescriptor {
    /// Offset du champ type d'événement dans le debug record.
    pub event_offset: usize,
    /// Offset du champ ligne courante dans le debug record.
    pub current_line_offset: usize,
    /// Offset du pointeur call-info dans le debug record.
    pub call_info_offset: usize,
    /// Offset de l'emplacement valeur-taguée de la fonction active dans
    /// call-info.
    pub function_offset: usize,
    /// Offset de l'octet de tag de type dans une valeur taguée.
    pub type_tag_offset: usize,
    /// Offset de l'union valeur (pointeur d'objet GC, pour les types
    /// collectables) dans une valeur taguée.
    pub value_offset: usize,
    /// Offset du pointeur de prototype dans une closure.
    pub closure_proto_offset: usize,
    /// Offset du pointeur de chaîne source dans un prototype.
    pub proto_source_offset: usize,
    /// Octets d'en-tête de chaîne internée à sauter pour atteindre le
    /// contenu de la chaîne.
    pub string_content_offset: usize,
    /// Valeur du tag de type (après masquage aux six bits de poids faible)
    /// identifiant une closure scriptée.
    pub scripted_closure_tag: u8,
}

/// PUC-Rio Lua 5.1. L'ABI du debug record de LuaJIT reflète celle-ci ; voir
/// [`LUAJIT`] pour le seul champ qui diffère en pratique (fiabilité de la
/// ligne courante, traitée au site d'appel, pas dans la table d'offsets).
pub const LUA_5_1: VmLayoutDescriptor = VmLayoutDescriptor {
    event_offset: 0,
    current_line_offset: 40,
    call_info_offset: 112,
    function_offset: 0,
    type_tag_offset: 8,
    value_offset: 0,
    closure_proto_offset: 16,
    proto_source_offset: 96,
    string_content_offset: 24,
    scripted_closure_tag: 6,
};

pub const LUA_5_2: VmLayoutDescriptor = VmLayoutDescriptor {
    call_info_offset: 120,
    proto_source_offset: 104,
    ..LUA_5_1
};

/// PUC-Rio Lua 5.3 — le dialecte pleinement détaillé dans
/// `original_source/LuaDebugHelper_x86/dllmain.cpp`.
pub const LUA_5_3: VmLayoutDescriptor = VmLayoutDescriptor {
    event_offset: 0,
    current_line_offset: 40,
    call_info_offset: 120,
    function_offset: 0,
    type_tag_offset: 8,
    value_offset: 0,
    closure_proto_offset: 24,
    proto_source_offset: 104,
    string_content_offset: 24,
    scripted_closure_tag: 6,
};

/// Lua 5.4 a élargi quelques entiers du debug record (`short_src` a bougé,
/// la comptabilité de `ci` a grossi) par rapport à 5.3 ; les champs que ce
/// hook touche se décalent en conséquence.
pub const LUA_5_4: VmLayoutDescriptor = VmLayoutDescriptor {
    call_info_offset: 128,
    proto_source_offset: 112,
    ..LUA_5_3
};

/// LuaJIT expose un debug record compatible `lua_Debug` mais ne remplit pas
/// `currentline` dessus comme le fait PUC-Rio Lua (spec.md §4.1 : "dialectes
/// dont le debug record n'embarque pas `current_line` nativement"). Le hook
/// appelle dans ce cas d'abord la fonction de récupération d'info propre à
/// la VM — un comportement conditionné par `Dialect::LuaJit`, pas par cette
/// table.
pub const LUAJIT: VmLayoutDescriptor = LUA_5_1;

impl Dialect {
    /// Descripteur compile-time pour ce dialecte, ou `None` pour `Generic`
    /// (qui n'a pas de table fixe — voir [`generic_from_offsets`]).
    pub fn descriptor(self) -> Option<VmLayoutDescriptor> {
        match self {
            Dialect::Lua51 => Some(LUA_5_1),
            Dialect::Lua52 => Some(LUA_5_2),
            Dialect::Lua53 => Some(LUA_5_3),
            Dialect::Lua54 => Some(LUA_5_4),
            Dialect::LuaJit => Some(LUAJIT),
            Dialect::Generic => None,
        }
    }

    /// `true` pour le seul dialecte dont le debug record a besoin d'un appel
    /// de récupération d'info côté VM pour remplir `current_line` (spec.md
    /// §4.1).
    pub fn needs_info_retrieval(self) -> bool {
        matches!(self, Dialect::LuaJit)
    }
}

/// Les dix mots d'offset exportés que le debugger remplit pour `Generic`
/// (spec.md §6). Lus à neuf à chaque invocation du hook — jamais mis en
/// cache, car le debugger peut encore être en train de les écrire lors des
/// premiers appels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenericOffsets {
    pub event_offset: u32,
    pub current_line_offset: u32,
    pub call_info_offset: u32,
    pub function_offset: u32,
    pub type_tag_offset: u32,
    pub value_offset: u32,
    pub closure_proto_offset: u32,
    pub proto_source_offset: u32,
    pub string_content_offset: u32,
    pub scripted_closure_tag: u32,
}

impl GenericOffsets {
    /// `true` quand chaque mot est encore à zéro — la classe d'échec
    /// "offsets génériques manquants" de spec.md §7, traitée en produisant
    /// un descripteur qui ne matche simplement jamais rien plutôt qu'en
    /// signalant une erreur.
    pub fn all_zero(&self) -> bool {
        *self == GenericOffsets::default()
    }
}

/// Construit un [`VmLayoutDescriptor`] à partir des mots d'offset génériques
/// en direct.
pub fn generic_from_offsets(o: &GenericOffsets) -> VmLayoutDescriptor {
    VmLayoutDescriptor {
        event_offset: o.event_offset as usize,
        current_line_offset: o.current_line_offset as usize,
        call_info_offset: o.call_info_offset as usize,
        function_offset: o.function_offset as usize,
        type_tag_offset: o.type_tag_offset as usize,
        value_offset: o.value_offset as usize,
        closure_proto_offset: o.closure_proto_offset as usize,
        proto_source_offset: o.proto_source_offset as usize,
        string_content_offset: o.string_content_offset as usize,
        scripted_closure_tag: o.scripted_closure_tag as u8,
    }
}
