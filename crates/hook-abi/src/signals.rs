//! signals.rs — fonctions de signal no-op (spec §4.5, §9)
//!
//! Le contrat porte sur l'*adresse* de chaque fonction, pas sur son corps :
//! le debugger attaché pose un point d'arrêt natif sur la première
//! instruction de chacune d'elles et n'a en réalité jamais besoin que
//! l'appel fasse quoi que ce soit d'observable du point de vue de Rust.
//! `#[inline(never)]` empêche l'optimiseur de replier l'appel au site
//! d'appel ; le `compiler_fence` plus une écriture volatile l'empêchent de
//! jeter le corps désormais-nulle-part-inliné lui-même, la même propriété
//! que `dllmain.cpp` obtient gratuitement du `__declspec(noinline)` de MSVC
//! et d'une écriture `volatile char dummy`.

use std::sync::atomic::{compiler_fence, AtomicU8, Ordering};

static SINK: AtomicU8 = AtomicU8::new(0);

/// Force une écriture dont l'optimiseur ne peut pas prouver qu'elle est
/// morte, pour que le corps de la fonction survive même après que
/// `#[inline(never)]` l'empêche d'être inliné.
#[inline(never)]
fn touch() {
    SINK.store(1, Ordering::SeqCst);
    compiler_fence(Ordering::SeqCst);
}

macro_rules! signal_fn {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[no_mangle]
        #[inline(never)]
        pub extern "C" fn $name() {
            touch();
        }
    };
}

signal_fn!(
    /// Déclenché une fois, à la fin de l'attachement de la bibliothèque
    /// (spec §6, cycle de vie de §10).
    on_initialized
);
signal_fn!(
    /// Déclenché après qu'une paire [`crate::state::HIT_ID`] /
    /// [`crate::state::HIT_VM_STATE`] est publiée (spec §4.2).
    on_breakpoint_hit
);
signal_fn!(
    /// Déclenché sur l'événement `LINE` qui complète un plan de step-into
    /// ou de step-over (spec §4.3).
    on_step_complete
);
signal_fn!(
    /// Déclenché sur l'événement de retour qui déroule jusqu'à la frame
    /// depuis laquelle un step-out a été demandé (spec §4.3).
    on_step_out
);
signal_fn!(
    /// Déclenché immédiatement sur un événement `CALL`/`TAILCALL` pendant
    /// qu'un plan de step-in est actif (spec §4.3).
    on_step_in
);
signal_fn!(
    /// Déclenché par le worker d'arrêt asynchrone à chaque sondage où il a
    /// trouvé du travail, avant de servir la boîte aux lettres (spec §4.4).
    on_async_break
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_functions_return_normally() {
        on_initialized();
        on_breakpoint_hit();
        on_step_complete();
        on_step_out();
        on_step_in();
        on_async_break();
    }
}
