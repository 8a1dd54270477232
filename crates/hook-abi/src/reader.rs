//! reader.rs — le seul endroit de ce workspace qui déréférence un pointeur étranger
//!
//! [`ProcessMemory`] implémente [`hook_core::VmMemoryReader`] et
//! [`hook_core::StackProbe`] en lisant l'espace d'adressage du processus
//! appelant lui-même — l'état VM et le debug record vivent dans le même
//! processus où cette bibliothèque est injectée, donc "lire la mémoire VM"
//! n'est que lire `*addr` sans aucun IPC impliqué. Chaque méthode est
//! `unsafe` en esprit au site d'appel (une adresse invalide est un bug du
//! debugger, pas une condition dont cette charge utile se remet selon §7)
//! mais exposée comme `fn` sûre ici car le contrat du trait l'exige ; le bloc
//! `unsafe` est poussé vers la plus petite lecture possible.

use hook_core::{StackProbe, VmMemoryReader};
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};

/// Lit directement dans l'espace d'adressage de ce processus. De taille
/// nulle : n'existe que pour porter les implémentations de trait, puisqu'il
/// n'y a pas d'état par instance à garder (la VM nous passant un mauvais
/// pointeur est le seul mode d'échec, et il est rapporté comme `None`/`Err`,
/// pas stocké).
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessMemory;

impl VmMemoryReader for ProcessMemory {
    fn read_usize(&self, addr: usize) -> Option<usize> {
        if addr == 0 {
            return None;
        }
        // SAFETY: l'appelant (l'algorithme de décodage de hook-core) ne
        // déréférence que des adresses dérivées d'un état VM que la VM
        // elle-même nous a passé ; une vérification de nullité couvre le seul
        // cas que spec §4.1 mentionne explicitement.
        Some(unsafe { *(addr as *const usize) })
    }

    fn read_u8(&self, addr: usize) -> Option<u8> {
        if addr == 0 {
            return None;
        }
        Some(unsafe { *(addr as *const u8) })
    }

    fn read_i32(&self, addr: usize) -> Option<i32> {
        if addr == 0 {
            return None;
        }
        Some(unsafe { *(addr as *const i32) })
    }

    fn read_cstr(&self, addr: usize) -> Option<String> {
        if addr == 0 {
            return None;
        }
        // SAFETY: le contenu de chaîne internée que la VM expose est
        // terminé par NUL par son propre contrat (spec §3 "source_name
        // (null-terminated...)").
        let cstr = unsafe { CStr::from_ptr(addr as *const c_char) };
        Some(cstr.to_string_lossy().into_owned())
    }
}

/// Signature équivalente à `lua_getinfo` (spec §6 : "jit_get_info_address").
/// `what` choisit les champs à remplir ; cette charge utile ne demande
/// jamais que la ligne courante (`"l"`), ce qui correspond à ce dont §4.1 a
/// besoin.
type JitGetInfoFn = unsafe extern "C" fn(vm_state: *mut c_void, what: *const c_char, ar: *mut c_void) -> c_int;

/// Signature équivalente à `lua_getstack` (spec §6 : "jit_get_stack_address").
/// Renvoie non-zéro tant que `level` désigne une frame vivante, `0` une fois
/// le parcours passé la plus externe ("plus de frames", spec §4.3).
type JitGetStackFn = unsafe extern "C" fn(vm_state: *mut c_void, level: c_int, ar: *mut c_void) -> c_int;

/// Appelle la fonction `jit_get_info_address` fournie par le debugger pour
/// remplir `debug_record` sur place (spec §4.1 : "le hook appelle d'abord la
/// propre fonction de récupération d'info de la VM pour remplir le
/// record"). Renvoie `false` si le pointeur de fonction n'est pas défini ou
/// si l'appel lui-même rapporte un échec.
pub fn jit_get_info(info_fn_addr: usize, vm_state: usize, debug_record: usize) -> bool {
    if info_fn_addr == 0 {
        return false;
    }
    // SAFETY: le debugger est contractuellement tenu de remplir
    // `jit_get_info_address` avec un pointeur de fonction compatible
    // `lua_getinfo` valide avant la première invocation du hook LuaJIT
    // (spec §6).
    let f: JitGetInfoFn = unsafe { std::mem::transmute(info_fn_addr) };
    let what = c"l";
    let rc = unsafe { f(vm_state as *mut c_void, what.as_ptr(), debug_record as *mut c_void) };
    rc != 0
}

/// Sonde la profondeur de pile d'appels en direct en invoquant à répétition
/// la fonction `jit_get_stack_address` du debugger avec des niveaux
/// croissants jusqu'à ce qu'elle rapporte "plus de frames" (réconciliation de
/// profondeur du dialecte JIT de spec §4.3).
#[derive(Debug, Clone, Copy)]
pub struct JitStackProbe {
    pub stack_fn_addr: usize,
    /// Buffer `lua_Debug` de taille scratch dans lequel l'appel de sondage
    /// écrit et qu'il jette immédiatement ; seul le code de retour compte ici.
    pub scratch_ar: usize,
}

impl StackProbe for JitStackProbe {
    fn depth(&self, vm_state: usize) -> u32 {
        if self.stack_fn_addr == 0 {
            return 0;
        }
        // SAFETY: même contrat que `jit_get_info`.
        let f: JitGetStackFn = unsafe { std::mem::transmute(self.stack_fn_addr) };
        let mut level = 0u32;
        loop {
            let rc = unsafe { f(vm_state as *mut c_void, level as c_int, self.scratch_ar as *mut c_void) };
            if rc == 0 {
                return level;
            }
            level += 1;
            // Une VM rapportant une pile d'appels non bornée est un bug de
            // la VM ; plafonner le parcours pour qu'un `jit_get_stack_address`
            // défaillant ne puisse pas faire tourner le thread VM
            // indéfiniment dans le corps synchrone du hook (§5 : "le hook
            // lui-même ne bloque jamais").
            if level > 1_000_000 {
                return level;
            }
        }
    }
}
