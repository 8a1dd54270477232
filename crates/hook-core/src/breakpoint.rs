//! breakpoint.rs — Table et filtre de points d'arrêt (spec.md §3, §4.2)
//!
//! Fondé sur le balayage linéaire de `original_source/LuaDebugHelper_x86/dllmain.cpp`
//! sur `luaHelperBreakData` :
//!
//! ```cpp
//! for (auto curr = luaHelperBreakData, end = luaHelperBreakData + luaHelperBreakCount; curr != end; curr++)
//!     if (ar->currentline == curr->line && uintptr_t(proto) == curr->proto)
//!         luaHelperBreakHitId = unsigned(curr - luaHelperBreakData);
//! ```
//!
//! étendu avec la branche de correspondance par nom de source que spec.md
//! ajoute pour les entrées sans prototype (l'original ne correspondait qu'à
//! l'adresse du prototype ; ce système arme aussi des points d'arrêt avant
//! qu'une adresse de prototype soit connue, indexés par nom de fichier
//! source à la place).

/// Capacité de la table — reflète le tableau exporté `breakpoint_table[256]`.
pub const MAX_BREAKPOINTS: usize = 256;
/// Octets utilisables par emplacement de nom de source dans le stockage
/// exporté (emplacements de 128 octets, un réservé au terminateur NUL).
pub const MAX_SOURCE_NAME_LEN: usize = 127;

/// Un point d'arrêt armé. `proto == 0` signifie "correspondance par nom de
/// source plutôt que par adresse de prototype" (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointEntry {
    pub line: u32,
    pub proto: usize,
    pub source_name: String,
}

/// Publié quand un événement correspond à un point d'arrêt armé (spec.md §3
/// "Hit record"). `hit_id` indexe la table dans laquelle la correspondance a
/// été trouvée.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitRecord {
    pub hit_id: u32,
    pub hit_vm_state: usize,
}

/// Catalogue borné et ordonné de points d'arrêt. Le debugger est censé
/// réécrire toute la table à chaque changement (spec.md §3 : "le debugger
/// écrit toute la table de façon atomique en mettant à jour les entrées
/// d'abord et le compteur en dernier") ; `hook-abi` resynchronise une
/// `BreakpointTable` depuis le tableau C exporté avant chaque invocation du
/// hook, donc ce type ne porte aucun état à long terme au-delà de "ce que la
/// dernière resynchro a vu".
#[derive(Debug, Clone, Default)]
pub struct BreakpointTable {
    entries: Vec<BreakpointEntry>,
}

impl BreakpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remplace toute la table. Les entrées au-delà de [`MAX_BREAKPOINTS`]
    /// sont silencieusement abandonnées (spec.md §3 : "les entrées au-delà
    /// du compteur déclaré sont ignorées" — `hook-abi` applique déjà cette
    /// règle via le champ exporté `breakpoint_count`, ceci est un second
    /// plafond, en profondeur de défense).
    pub fn set(&mut self, mut entries: Vec<BreakpointEntry>) {
        entries.truncate(MAX_BREAKPOINTS);
        self.entries = entries;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Filtre par balayage linéaire (spec.md §4.2). `proto` vaut `0` pour une
    /// frame native (spec.md §4.1 étape 3 : une frame native ne correspond
    /// qu'aux entrées source-only, ce qui est automatiquement satisfait
    /// puisqu'une telle frame ne peut jamais égaler un `entry.proto` non
    /// nul). Premier match gagnant ; les entrées suivantes — y compris les
    /// doublons exacts — ne sont jamais considérées.
    pub fn find_match(&self, line: u32, proto: usize, source_name: &str) -> Option<u32> {
        if line == 0 {
            return None;
        }
        self.entries
            .iter()
            .position(|e| {
                e.line == line
                    && if e.proto != 0 {
                        proto == e.proto
                    } else {
                        source_name == e.source_name
                    }
            })
            .map(|ix| ix as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(line: u32, proto: usize, source: &str) -> BreakpointEntry {
        BreakpointEntry {
            line,
            proto,
            source_name: source.to_string(),
        }
    }

    #[test]
    fn matches_by_prototype_address() {
        let mut t = BreakpointTable::new();
        t.set(vec![entry(10, 0xDEAD_BEEF, "")]);
        assert_eq!(t.find_match(10, 0xDEAD_BEEF, "anything"), Some(0));
        assert_eq!(t.find_match(10, 0xCAFE, "anything"), None);
        assert_eq!(t.find_match(9, 0xDEAD_BEEF, "anything"), None);
    }

    #[test]
    fn matches_by_source_name_byte_for_byte() {
        let mut t = BreakpointTable::new();
        t.set(vec![entry(5, 0, "main.script")]);
        assert_eq!(t.find_match(5, 0x1234, "main.script"), Some(0));
        assert_eq!(t.find_match(5, 0x1234, "other.script"), None);
    }

    #[test]
    fn line_zero_never_matches() {
        let mut t = BreakpointTable::new();
        t.set(vec![entry(0, 0, "")]);
        assert_eq!(t.find_match(0, 0, ""), None);
    }

    #[test]
    fn empty_source_name_entry_matches_nothing_useful() {
        let mut t = BreakpointTable::new();
        t.set(vec![entry(5, 0, "")]);
        // Une frame native sonde aussi avec source_name == "", mais c'est le
        // cas dégénéré que spec.md signale : il "ne matche rien d'utile" en
        // pratique car le debugger est censé toujours fournir un vrai nom de
        // source ici. Il matche techniquement "" == "".
        assert_eq!(t.find_match(5, 0, ""), Some(0));
    }

    #[test]
    fn first_match_wins_over_duplicates() {
        let mut t = BreakpointTable::new();
        t.set(vec![entry(10, 0xAAAA, ""), entry(10, 0xAAAA, "")]);
        assert_eq!(t.find_match(10, 0xAAAA, ""), Some(0));
    }

    #[test]
    fn entries_beyond_capacity_are_dropped() {
        let mut t = BreakpointTable::new();
        let many = (0..300).map(|i| entry(i + 1, i as usize + 1, "")).collect();
        t.set(many);
        assert_eq!(t.len(), MAX_BREAKPOINTS);
    }
}
