//! Simulations de bout en bout de flux d'événements contre un espace
//! d'adressage fake — pas de processus injecté, pas de `hook-abi`, juste un
//! `HookEngine` piloté de la même façon que le point d'entrée de hook de
//! `hook-abi` le pilote à chaque événement VM.

use hook_core::{
    decode_event, decode_frame, reader::fake::FakeMemory, BreakpointEntry, Dialect, HookEngine,
};

/// Pose une chaîne scriptée call-info -> closure -> prototype -> source à
/// `record_addr`, correspondant aux offsets du dialecte `Lua53`, et écrit les
/// champs `(event, line)` donnés dans le même debug record.
fn step_record(mem: &mut FakeMemory, record_addr: usize, event: i32, line: i32, proto: usize, source: &str) {
    let d = Dialect::Lua53.descriptor().unwrap();
    mem.i32s.insert(record_addr + d.event_offset, event);
    mem.i32s.insert(record_addr + d.current_line_offset, line);

    let call_info = record_addr + 0x10_000;
    let func = record_addr + 0x20_000;
    let closure = record_addr + 0x30_000;
    let source_ptr = record_addr + 0x50_000;

    mem.usizes.insert(record_addr + d.call_info_offset, call_info);
    mem.usizes.insert(call_info + d.function_offset, func);
    mem.u8s.insert(func + d.type_tag_offset, d.scripted_closure_tag);
    mem.usizes.insert(func + d.value_offset, closure);
    mem.usizes.insert(closure + d.closure_proto_offset, proto);
    mem.usizes.insert(proto + d.proto_source_offset, source_ptr);
    mem.cstrs
        .insert(source_ptr + d.string_content_offset, source.to_string());
}

#[test]
fn breakpoint_hit_mid_step_over_still_reports_independently() {
    let d = Dialect::Lua53.descriptor().unwrap();
    let mut engine = HookEngine::new();
    engine.breakpoints.set(vec![BreakpointEntry {
        line: 21,
        proto: 0x4000,
        source_name: String::new(),
    }]);
    engine.step.want_over = true;

    let mut mem = FakeMemory::default();
    let record_addr = 0x100;

    // CALL dans une fonction imbriquée - approfondit skip_depth, pas de signal.
    step_record(&mut mem, record_addr, 0, 20, 0x4000, "main.lua");
    let ev = decode_event(record_addr, &d, &mem).unwrap();
    let frame = decode_frame(record_addr, &d, &mem);
    let out = engine.on_event(0x9999, ev, &frame);
    assert!(out.step_signal.is_none());
    assert!(out.hit.is_none());
    assert_eq!(engine.step.skip_depth, 1);

    // LINE à l'intérieur de l'appel imbriqué, sur la ligne du point d'arrêt
    // armé - déclenche quand même le point d'arrêt même si le plan de pas
    // nous fait "sauter".
    step_record(&mut mem, record_addr, 2, 21, 0x4000, "main.lua");
    let ev = decode_event(record_addr, &d, &mem).unwrap();
    let frame = decode_frame(record_addr, &d, &mem);
    let out = engine.on_event(0x9999, ev, &frame);
    assert!(out.step_signal.is_none());
    let hit = out.hit.expect("breakpoint should fire regardless of step state");
    assert_eq!(hit.hit_id, 0);

    // RET vers l'extérieur, puis le prochain LINE complète le step-over.
    step_record(&mut mem, record_addr, 1, 21, 0x4000, "main.lua");
    let ev = decode_event(record_addr, &d, &mem).unwrap();
    let frame = decode_frame(record_addr, &d, &mem);
    engine.on_event(0x9999, ev, &frame);
    assert_eq!(engine.step.skip_depth, 0);

    step_record(&mut mem, record_addr, 2, 11, 0x4000, "main.lua");
    let ev = decode_event(record_addr, &d, &mem).unwrap();
    let frame = decode_frame(record_addr, &d, &mem);
    let out = engine.on_event(0x9999, ev, &frame);
    assert_eq!(out.step_signal, Some(hook_core::StepSignal::Complete));
}

#[test]
fn native_call_never_matches_a_prototype_scoped_breakpoint() {
    let d = Dialect::Lua53.descriptor().unwrap();
    let mut engine = HookEngine::new();
    engine.breakpoints.set(vec![BreakpointEntry {
        line: 5,
        proto: 0x4000,
        source_name: String::new(),
    }]);

    let mut mem = FakeMemory::default();
    let record_addr = 0x200;
    mem.i32s.insert(record_addr + d.event_offset, 2);
    mem.i32s.insert(record_addr + d.current_line_offset, 5);
    // Aucune entrée call-info -> decode_frame traite ceci comme une frame native.

    let ev = decode_event(record_addr, &d, &mem).unwrap();
    let frame = decode_frame(record_addr, &d, &mem);
    assert!(frame.is_native());
    let out = engine.on_event(0x1, ev, &frame);
    assert!(out.hit.is_none());
}

#[test]
fn unreadable_event_tag_yields_no_decoded_event_and_nothing_updates() {
    let d = Dialect::Lua53.descriptor().unwrap();
    let mem = FakeMemory::default();
    assert!(decode_event(0x300, &d, &mem).is_none());
}
