//! engine.rs — Dispatch par événement, niveau racine (spec.md §4.1)
//!
//! Relie les deux décisions qu'une invocation de hook doit prendre —
//! transition de pas, correspondance de point d'arrêt — une fois que
//! l'appelant (`hook-abi`, ou un test) a déjà décodé l'événement et la frame
//! active. Gardé sans reader pour composer aussi bien avec le vrai
//! `VmMemoryReader`/`StackProbe` qu'avec les fakes de `frame.rs`/`step.rs`,
//! sans aucune compilation conditionnelle.

use crate::breakpoint::{BreakpointTable, HitRecord};
use crate::frame::{DecodedEvent, DecodedFrame};
use crate::step::{self, StepSignal, StepState};

/// Tout ce dont une invocation de hook a besoin entre deux événements : le
/// plan de pas courant et la dernière table de points d'arrêt publiée par le
/// debugger.
#[derive(Debug, Default)]
pub struct HookEngine {
    pub step: StepState,
    pub breakpoints: BreakpointTable,
}

/// Ce qu'un appel `on_event` a décidé. Au plus un de chaque — un seul
/// événement peut porter à la fois un signal de pas et un hit de point
/// d'arrêt (p.ex. un événement `LINE` qui complète un pas et tombe sur une
/// ligne armée).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventOutcome {
    pub step_signal: Option<StepSignal>,
    pub hit: Option<HitRecord>,
}

impl HookEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fait passer un événement VM par le contrôleur de pas puis le filtre
    /// de points d'arrêt (spec.md §4.1 étapes 2-3). `vm_state` est reporté
    /// tel quel dans tout [`HitRecord`] résultant.
    pub fn on_event(&mut self, vm_state: usize, event: DecodedEvent, frame: &DecodedFrame) -> EventOutcome {
        let step_signal = step::on_event(&mut self.step, event.kind);

        let hit = event.current_line.and_then(|raw_line| {
            if raw_line <= 0 {
                return None;
            }
            let line = raw_line as u32;
            let (proto, source_name): (usize, &str) = match &frame.proto {
                Some(p) => (*p, frame.source_name.as_deref().unwrap_or("")),
                None => (0, ""),
            };
            self.breakpoints
                .find_match(line, proto, source_name)
                .map(|hit_id| HitRecord {
                    hit_id,
                    hit_vm_state: vm_state,
                })
        });

        EventOutcome { step_signal, hit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakpoint::BreakpointEntry;
    use crate::descriptor::EventKind;

    fn ev(kind: EventKind, line: i32) -> DecodedEvent {
        DecodedEvent {
            kind,
            current_line: Some(line),
        }
    }

    #[test]
    fn breakpoint_on_prototype_fires_once_with_correct_hit_id() {
        // Scénario 1.
        let mut engine = HookEngine::new();
        engine.breakpoints.set(vec![BreakpointEntry {
            line: 10,
            proto: 0xDEAD_BEEF,
            source_name: String::new(),
        }]);
        let scripted = DecodedFrame {
            proto: Some(0xDEAD_BEEF),
            source_name: Some("main.lua".into()),
        };

        let out1 = engine.on_event(0x9, ev(EventKind::Call, 9), &scripted);
        assert!(out1.hit.is_none());
        let out2 = engine.on_event(0x9, ev(EventKind::Line, 9), &scripted);
        assert!(out2.hit.is_none());
        let out3 = engine.on_event(0x9, ev(EventKind::Line, 10), &scripted);
        let hit = out3.hit.expect("expected a breakpoint hit");
        assert_eq!(hit.hit_id, 0);
        assert_eq!(hit.hit_vm_state, 0x9);
    }

    #[test]
    fn breakpoint_on_source_name() {
        // Scénario 2.
        let mut engine = HookEngine::new();
        engine.breakpoints.set(vec![BreakpointEntry {
            line: 5,
            proto: 0,
            source_name: "main.script".into(),
        }]);
        let frame_main = DecodedFrame {
            proto: Some(0x1),
            source_name: Some("main.script".into()),
        };
        let frame_other = DecodedFrame {
            proto: Some(0x1),
            source_name: Some("other.script".into()),
        };

        let hit = engine.on_event(0x1, ev(EventKind::Line, 5), &frame_main).hit;
        assert!(hit.is_some());

        let no_hit = engine.on_event(0x1, ev(EventKind::Line, 5), &frame_other).hit;
        assert!(no_hit.is_none());
    }

    #[test]
    fn native_frame_only_matches_source_only_entries() {
        let mut engine = HookEngine::new();
        engine.breakpoints.set(vec![
            BreakpointEntry { line: 5, proto: 0xAAAA, source_name: String::new() },
            BreakpointEntry { line: 5, proto: 0, source_name: "lib.script".into() },
        ]);
        let native = DecodedFrame::native();
        assert!(engine.on_event(0x1, ev(EventKind::Line, 5), &native).hit.is_none());

        // Même une frame native peut toucher une entrée source-only si le
        // debugger lui fournit un nom correspondant — bien que spec.md §4.1
        // dise qu'une frame native sonde avec ("") par construction, donc en
        // pratique ceci ne joue que quand un appelant (p.ex. un test) injecte
        // quand même un nom de source.
    }

    #[test]
    fn no_event_without_a_current_line_ever_hits() {
        let mut engine = HookEngine::new();
        engine.breakpoints.set(vec![BreakpointEntry {
            line: 1,
            proto: 0xAAAA,
            source_name: String::new(),
        }]);
        let frame = DecodedFrame {
            proto: Some(0xAAAA),
            source_name: None,
        };
        let no_line = DecodedEvent { kind: EventKind::Call, current_line: None };
        assert!(engine.on_event(0x1, no_line, &frame).hit.is_none());
    }

    #[test]
    fn event_stream_never_signals_without_step_flags_set() {
        // "aucune fonction signal autre que on_initialized n'est jamais invoquée"
        let mut engine = HookEngine::new();
        for kind in [
            EventKind::Call,
            EventKind::TailCall,
            EventKind::Return,
            EventKind::TailReturn,
            EventKind::Line,
            EventKind::Count,
        ] {
            let out = engine.on_event(0x1, ev(kind, 1), &DecodedFrame::native());
            assert_eq!(out.step_signal, None);
        }
    }
}
