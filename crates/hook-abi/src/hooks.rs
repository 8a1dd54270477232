//! hooks.rs — les points d'entrée de hook exportés (spec §4.1, §6)
//!
//! Une fonction `#[no_mangle] extern "C"` par dialecte pris en charge, plus
//! `hook_entry_generic`. Chacune est la fonction littérale que le debugger
//! installe dans la VM comme hook par instruction ; [`dispatch`] est le corps
//! partagé auquel chacune délègue, paramétré seulement par le
//! [`VmLayoutDescriptor`] contre lequel décoder et par le fait que ce
//! dialecte ait besoin ou non de l'indirection récupération-d'info/sonde-de-
//! pile qu'exige LuaJIT.

use crate::reader::{self, JitStackProbe, ProcessMemory};
use crate::{signals, state};
use hook_core::descriptor::{
    generic_from_offsets, Dialect, EventKind, VmLayoutDescriptor, LUA_5_1, LUA_5_2, LUA_5_3, LUA_5_4, LUAJIT,
};
use hook_core::frame::{decode_event, decode_frame};
use hook_core::step::{self, StepSignal};
use std::os::raw::c_void;
use std::panic::catch_unwind;
use std::sync::atomic::Ordering;

/// Corps de dispatch partagé par chaque point d'entrée de hook exporté
/// (spec §4.1). Ne panique jamais à travers la frontière FFI : l'appelant
/// enveloppe ceci dans `catch_unwind` (ajout de spec §7 par rapport à une
/// translittération littérale de `original_source/`, où le C++ de référence
/// ne peut pas du tout paniquer).
fn dispatch(descriptor: &VmLayoutDescriptor, needs_info_retrieval: bool, vm_state: usize, debug_record: usize) {
    let reader = ProcessMemory;

    // Le type d'événement vit dans le debug record lui-même, rempli par la
    // VM avant que le hook ne s'exécute — ce n'est pas quelque chose que
    // l'appel de récupération d'info remplit — donc il est toujours lisible
    // que cet appel réussisse ou non.
    let Some(event) = decode_event(debug_record, descriptor, &reader) else {
        return;
    };

    let info_ok = !needs_info_retrieval || {
        let info_fn = state::JIT_GET_INFO_ADDRESS.load(Ordering::Relaxed);
        reader::jit_get_info(info_fn, vm_state, debug_record)
    };

    // Étape 2 : mise à jour du contrôleur de pas. S'exécute que la
    // récupération d'info ait réussi ou non — "si cet appel échoue, seule la
    // mise à jour du contrôleur de pas s'exécute" (spec §4.1).
    let mut step_state = state::load_step_state();
    let step_signal = step::on_event(&mut step_state, event.kind);

    if needs_info_retrieval && info_ok {
        let stack_fn = state::JIT_GET_STACK_ADDRESS.load(Ordering::Relaxed);
        let probe = JitStackProbe { stack_fn_addr: stack_fn, scratch_ar: debug_record };
        match event.kind {
            EventKind::Call => step::jit_reconcile_on_call(&mut step_state, &probe, vm_state),
            EventKind::Line => step::jit_reconcile_on_line(&mut step_state, &probe, vm_state),
            _ => {}
        }
    }
    state::store_step_derived(&step_state);

    match step_signal {
        Some(StepSignal::In) => signals::on_step_in(),
        Some(StepSignal::Out) => signals::on_step_out(),
        Some(StepSignal::Complete) => signals::on_step_complete(),
        None => {}
    }

    // Étape 3 : recherche de point d'arrêt. Entièrement sautée quand la
    // récupération d'info a échoué — il n'y a pas de frame/ligne courante à
    // rechercher sans elle (spec §4.1).
    if !info_ok {
        return;
    }
    let frame = decode_frame(debug_record, descriptor, &reader);

    // Les frames natives sondent avec (ligne, 0, "") — ne correspondant
    // qu'aux points d'arrêt source-seul, selon spec §4.1.
    let Some(raw_line) = event.current_line else { return };
    if raw_line <= 0 {
        return;
    }
    let line = raw_line as u32;
    let (proto, source_name): (usize, &str) = match &frame.proto {
        Some(p) => (*p, frame.source_name.as_deref().unwrap_or("")),
        None => (0, ""),
    };

    let table = state::resync_breakpoint_table(|addr| reader.read_cstr(addr));
    if let Some(hit_id) = table.find_match(line, proto, source_name) {
        state::publish_hit(hit_id, vm_state);
        signals::on_breakpoint_hit();
    }
}

macro_rules! dialect_hook {
    ($name:ident, $dialect:expr, $descriptor:expr) => {
        /// Point d'entrée de hook que le debugger installe pour ce dialecte
        /// (spec §6).
        ///
        /// Dispatche directement contre le descripteur compile-time, plutôt
        /// qu'à travers [`Dialect::descriptor`], pour que ce symbole ne
        /// puisse jamais paniquer avant d'atteindre `catch_unwind` — dérouler
        /// à travers cette frontière `extern "C"` jusque dans la propre pile
        /// d'appels de la VM serait un comportement indéfini (spec §7).
        #[no_mangle]
        pub extern "C" fn $name(vm_state: *mut c_void, debug_record: *mut c_void) {
            let needs_info = $dialect.needs_info_retrieval();
            let _ = catch_unwind(|| dispatch(&$descriptor, needs_info, vm_state as usize, debug_record as usize));
        }
    };
}

dialect_hook!(hook_entry_lua51, Dialect::Lua51, LUA_5_1);
dialect_hook!(hook_entry_lua52, Dialect::Lua52, LUA_5_2);
dialect_hook!(hook_entry_lua53, Dialect::Lua53, LUA_5_3);
dialect_hook!(hook_entry_lua54, Dialect::Lua54, LUA_5_4);
dialect_hook!(hook_entry_luajit, Dialect::LuaJit, LUAJIT);

#[cfg(feature = "trace")]
fn log_generic_offsets_unset() {
    log::debug!("{}", hook_core::HookError::GenericOffsetsUnset);
}
#[cfg(not(feature = "trace"))]
fn log_generic_offsets_unset() {}

/// Point d'entrée de hook pour le dialecte `Generic` (spec §6) : reconstruit
/// son descripteur à chaque appel à partir des dix mots d'offset exportés,
/// plutôt qu'à partir d'une table compile-time. Des offsets tous nuls
/// (spec §7 : "offsets génériques manquants") produisent un descripteur qui
/// ne correspond simplement jamais à rien — pas une erreur.
#[no_mangle]
pub extern "C" fn hook_entry_generic(vm_state: *mut c_void, debug_record: *mut c_void) {
    let offsets = state::load_generic_offsets();
    if offsets.all_zero() {
        log_generic_offsets_unset();
    }
    let descriptor = generic_from_offsets(&offsets);
    let _ = catch_unwind(|| dispatch(&descriptor, false, vm_state as usize, debug_record as usize));
}

#[cfg(test)]
mod tests {
    use super::*;
    use hook_core::descriptor::LUA_5_3;
    use serial_test::serial;
    use std::ffi::CString;
    use std::sync::atomic::Ordering as O;

    /// Fuit un buffer d'octets mis à zéro et renvoie son adresse, pour
    /// construire une fausse chaîne call-info → closure → prototype → source
    /// Lua 5.3 en mémoire de processus réelle (reflète les tests
    /// `FakeMemory` de `hook-core`, mais contre les vraies lectures de
    /// pointeur de `ProcessMemory` plutôt qu'un `HashMap`).
    fn leak_buf(len: usize) -> usize {
        let buf: &'static mut [u8] = Box::leak(vec![0u8; len].into_boxed_slice());
        buf.as_mut_ptr() as usize
    }

    unsafe fn write_usize(addr: usize, offset: usize, value: usize) {
        ((addr + offset) as *mut usize).write(value);
    }
    unsafe fn write_i32(addr: usize, offset: usize, value: i32) {
        ((addr + offset) as *mut i32).write(value);
    }
    unsafe fn write_u8(addr: usize, offset: usize, value: u8) {
        ((addr + offset) as *mut u8).write(value);
    }

    /// Construit une frame Lua 5.3 scriptée et écrit `(event, line)` dans un
    /// buffer de debug record neuf, renvoyant son adresse. `proto_addr` doit
    /// venir de [`make_proto_with_source`].
    fn scripted_record(event: i32, line: i32, proto_addr: usize) -> usize {
        let d = LUA_5_3;
        let record = leak_buf(256);
        let call_info = leak_buf(16);
        let func = leak_buf(16);
        let closure = leak_buf(32);

        unsafe {
            write_i32(record, d.event_offset, event);
            write_i32(record, d.current_line_offset, line);
            write_usize(record, d.call_info_offset, call_info);
            write_usize(call_info, d.function_offset, func);
            write_u8(func, d.type_tag_offset, d.scripted_closure_tag);
            write_usize(func, d.value_offset, closure);
            write_usize(closure, d.closure_proto_offset, proto_addr);
        }
        record
    }

    fn make_proto_with_source(source: &str) -> usize {
        let d = LUA_5_3;
        let proto = leak_buf(112);
        let source_block = leak_buf(64);
        let cstr = CString::new(source).unwrap();
        let bytes = cstr.as_bytes_with_nul();
        let payload_addr = source_block + d.string_content_offset;
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), payload_addr as *mut u8, bytes.len());
            write_usize(proto, d.proto_source_offset, source_block);
        }
        proto
    }

    fn reset_globals() {
        state::STEP_IN.store(0, O::Relaxed);
        state::STEP_OVER.store(0, O::Relaxed);
        state::STEP_OUT.store(0, O::Relaxed);
        state::SKIP_DEPTH.store(0, O::Relaxed);
        state::STACK_DEPTH_AT_CALL.store(0, O::Relaxed);
        state::BREAKPOINT_COUNT.store(0, O::Relaxed);
        state::HIT_ID.store(0, O::Relaxed);
        state::HIT_VM_STATE.store(0, O::Relaxed);
    }

    fn set_single_breakpoint(line: usize, proto: usize) {
        unsafe {
            let table = &mut *std::ptr::addr_of_mut!(state::BREAKPOINT_TABLE);
            table[0] = state::BreakpointRawEntry { line, proto, source_name: 0 };
        }
        state::BREAKPOINT_COUNT.store(1, O::Relaxed);
    }

    #[test]
    #[serial]
    fn breakpoint_on_prototype_end_to_end() {
        // Scénario 1 de spec §8, piloté à travers le vrai symbole exporté
        // `hook_entry_lua53` et les vraies statics globales.
        reset_globals();
        let proto = make_proto_with_source("main.lua");
        set_single_breakpoint(10, proto);

        let vm_state = 0x9999usize as *mut c_void;
        let r1 = scripted_record(0, 9, proto);
        hook_entry_lua53(vm_state, r1 as *mut c_void);
        assert_eq!(state::HIT_ID.load(O::Relaxed), 0);
        assert_eq!(state::HIT_VM_STATE.load(O::Relaxed), 0);

        let r2 = scripted_record(2, 9, proto);
        hook_entry_lua53(vm_state, r2 as *mut c_void);
        assert_eq!(state::HIT_VM_STATE.load(O::Relaxed), 0);

        let r3 = scripted_record(2, 10, proto);
        hook_entry_lua53(vm_state, r3 as *mut c_void);
        assert_eq!(state::HIT_ID.load(O::Relaxed), 0);
        assert_eq!(state::HIT_VM_STATE.load(O::Relaxed), 0x9999);

        reset_globals();
    }

    #[test]
    #[serial]
    fn step_over_across_a_call_end_to_end() {
        // Scénario 3 de spec §8.
        reset_globals();
        let proto = make_proto_with_source("main.lua");
        state::STEP_OVER.store(1, O::Relaxed);
        let vm_state = 0x1234usize as *mut c_void;

        hook_entry_lua53(vm_state, scripted_record(0, 20, proto) as *mut c_void); // CALL
        assert_eq!(state::SKIP_DEPTH.load(O::Relaxed), 1);

        hook_entry_lua53(vm_state, scripted_record(2, 20, proto) as *mut c_void); // LINE@20
        hook_entry_lua53(vm_state, scripted_record(2, 21, proto) as *mut c_void); // LINE@21
        assert_eq!(state::SKIP_DEPTH.load(O::Relaxed), 1);

        hook_entry_lua53(vm_state, scripted_record(1, 21, proto) as *mut c_void); // RET
        assert_eq!(state::SKIP_DEPTH.load(O::Relaxed), 0);

        hook_entry_lua53(vm_state, scripted_record(2, 11, proto) as *mut c_void); // LINE@11
        // on_step_complete s'est déclenché ; il n'y a pas de compteur de
        // signal visible depuis Rust à vérifier ici (le contrat est
        // l'adresse du symbole, selon spec §4.2/§4.5), mais skip_depth restant
        // à 0 confirme que le plan s'est terminé plutôt que de se
        // réapprofondir.
        assert_eq!(state::SKIP_DEPTH.load(O::Relaxed), 0);

        state::STEP_OVER.store(0, O::Relaxed);
        reset_globals();
    }

    #[test]
    #[serial]
    fn unreadable_debug_record_never_panics_the_hook() {
        reset_globals();
        // Adresse 0 : chaque méthode du reader renvoie `None` sur une
        // adresse nulle, donc ceci doit revenir normalement sans hit et
        // sans signal de pas.
        hook_entry_lua53(std::ptr::null_mut(), std::ptr::null_mut());
        assert_eq!(state::HIT_ID.load(O::Relaxed), 0);
        assert_eq!(state::HIT_VM_STATE.load(O::Relaxed), 0);
    }

    #[test]
    #[serial]
    fn generic_dialect_with_all_zero_offsets_never_matches() {
        reset_globals();
        // Les offsets sont déjà tous nuls par défaut ; une ligne non nulle
        // lue à l'offset 0 depuis un vrai record ne doit toujours ni planter
        // ni correspondre.
        let record = leak_buf(256);
        unsafe {
            write_i32(record, 0, 2); // LINE à l'offset 0 == event_offset == current_line_offset
        }
        set_single_breakpoint(2, 0xAAAA);
        hook_entry_generic(0x1usize as *mut c_void, record as *mut c_void);
        // L'entrée armée est scoppée au prototype (proto 0xAAAA) ; un
        // descripteur tout à zéro décode toujours une frame native (proto
        // 0), donc il ne peut jamais satisfaire cette entrée quelle que soit
        // la "ligne" qu'il dérive.
        assert_eq!(state::HIT_VM_STATE.load(O::Relaxed), 0);
        reset_globals();
    }
}
