//! reader.rs — Façade entre l'algorithme de décodage sûr et la mémoire VM brute
//!
//! `hook-core` ne déréférence jamais lui-même un pointeur. Chaque lecture de
//! l'état VM opaque passe par `VmMemoryReader`, dont la seule implémentation
//! dans le système réel (`hook-abi::reader::ProcessMemory`) fait la véritable
//! arithmétique de pointeurs `unsafe`. Cette séparation est ce qui permet à
//! l'algorithme de décodage de `frame.rs` et à la réconciliation de
//! profondeur de step-over dans `step.rs` de tourner sous un simple
//! `#[test]` contre un fake en mémoire, sans processus injecté.

/// Accès en lecture à l'espace d'adressage dans lequel vit le pointeur d'état
/// VM.
///
/// Toutes les méthodes renvoient `None` sur ce qui serait une lecture hors
/// limites ou non mappée ; `hook-core` traite `None` de la même façon que la
/// classe d'échec "frame manquante ou invalide" de spec.md — passer
/// silencieusement, jamais paniquer.
pub trait VmMemoryReader {
    fn read_usize(&self, addr: usize) -> Option<usize>;
    fn read_u8(&self, addr: usize) -> Option<u8>;
    fn read_i32(&self, addr: usize) -> Option<i32>;
    /// Lit une chaîne d'octets terminée par NUL à partir de `addr` (UTF-8 de
    /// façon permissive).
    fn read_cstr(&self, addr: usize) -> Option<String>;
}

/// Compte les frames d'appel actuellement vivantes pour la réconciliation de
/// profondeur du dialecte JIT décrite dans spec.md §4.3. `depth` doit être
/// appelable à répétition et converger vers une valeur stable entre deux
/// événements VM ; c'est la façade côté Rust sur la boucle de sondage façon
/// `lua_getstack` de `original_source`.
pub trait StackProbe {
    /// Renvoie la profondeur de pile d'appels courante pour `vm_state`, ou
    /// `None` une fois que le sondage a dépassé la frame la plus externe
    /// ("plus de frames").
    fn depth(&self, vm_state: usize) -> u32;
}
