//! step.rs — Contrôleur de pas-à-pas (spec.md §3 "Step state", §4.3)
//!
//! Le hook C++ original (`original_source/LuaDebugHelper_x86/dllmain.cpp`)
//! inline ceci comme une suite de `if` sur quatre globales `extern "C"`
//! (`luaHelperStepOver`, `luaHelperStepInto`, `luaHelperStepOut`,
//! `luaHelperSkipDepth`). Ce module est la même machine à états, extraite
//! dans une table de transition explicite, pour que chaque ligne de spec.md
//! §4.3 ait un bras de `match` correspondant et un test correspondant.

use crate::descriptor::EventKind;
use crate::reader::StackProbe;

/// État de pas (spec.md §3). Remis à zéro à chaque complétion de pas et sur
/// commande explicite du debugger — jamais implicitement en déclenchant un
/// signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepState {
    pub want_in: bool,
    pub want_over: bool,
    pub want_out: bool,
    pub skip_depth: u32,
    /// Utilisé uniquement par la réconciliation de profondeur du dialecte
    /// JIT dans [`jit_reconcile_on_call`] / [`jit_reconcile_on_line`] ; `0`
    /// signifie "pas de mesure en cours".
    pub stack_depth_at_call: u32,
}

impl StepState {
    pub fn reset(&mut self) {
        *self = StepState::default();
    }
}

/// Un signal lié au pas-à-pas à déclencher, selon la table de transition de
/// spec.md §4.3. Déclencher un signal ne remet jamais les drapeaux de pas à
/// zéro lui-même — c'est le debugger qui le fait explicitement entre l'arrêt
/// et la reprise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepSignal {
    In,
    Out,
    Complete,
}

/// Fait avancer `state` pour un événement VM et renvoie le signal à
/// déclencher, le cas échéant. Exhaustif sur la table de spec.md §4.3 ;
/// `EventKind::Count` renvoie toujours `None`.
pub fn on_event(state: &mut StepState, kind: EventKind) -> Option<StepSignal> {
    match kind {
        EventKind::Call => {
            if state.want_in {
                Some(StepSignal::In)
            } else if state.want_over || state.want_out {
                state.skip_depth += 1;
                None
            } else {
                None
            }
        }
        EventKind::TailCall => {
            if state.want_in {
                Some(StepSignal::In)
            } else {
                // Les appels en queue n'approfondissent pas la profondeur
                // observable pour over/out.
                None
            }
        }
        EventKind::Return | EventKind::TailReturn => {
            if state.want_out && state.skip_depth == 0 {
                Some(StepSignal::Out)
            } else if (state.want_over || state.want_out) && state.skip_depth > 0 {
                state.skip_depth -= 1;
                None
            } else {
                None
            }
        }
        EventKind::Line => {
            if (state.want_over || state.want_in) && state.skip_depth == 0 {
                Some(StepSignal::Complete)
            } else {
                None
            }
        }
        EventKind::Count => None,
    }
}

/// Réconciliation de profondeur pour le dialecte JIT (spec.md §4.3). À
/// appeler sur chaque événement `CALL` tant qu'un plan de step-over est
/// actif ; commence à mesurer la profondeur de la pile d'appels la première
/// fois que ceci se déclenche après que `stack_depth_at_call` soit remis à 0.
pub fn jit_reconcile_on_call(state: &mut StepState, probe: &dyn StackProbe, vm_state: usize) {
    if state.want_over && state.stack_depth_at_call == 0 {
        state.stack_depth_at_call = probe.depth(vm_state);
    }
}

/// À appeler sur chaque événement `LINE` tant qu'une réconciliation
/// step-over du dialecte JIT peut être en cours. Si la profondeur fraîchement
/// mesurée est tombée sous la profondeur mémorisée, la VM a forcément
/// retourné à travers des frames JITtées sans événement `RET`
/// correspondant — traiter les retours manquants comme atomiques : mettre
/// `skip_depth` à zéro et arrêter de mesurer.
pub fn jit_reconcile_on_line(state: &mut StepState, probe: &dyn StackProbe, vm_state: usize) {
    if state.stack_depth_at_call == 0 {
        return;
    }
    let current = probe.depth(vm_state);
    if current < state.stack_depth_at_call {
        state.skip_depth = 0;
        state.stack_depth_at_call = 0;
    }
}
