//! worker.rs — le thread worker d'arrêt asynchrone (spec §4.4)
//!
//! Un unique thread dédié, lancé une fois à l'attachement de la bibliothèque,
//! qui sonde [`crate::state::ASYNC_BREAK_CODE`] à ~10 Hz et, sur requête,
//! installe ou efface le propre hook de la VM sur une liste d'états VM
//! fournie par le debugger. C'est le seul mécanisme par lequel une VM en
//! cours d'exécution, sans point d'arrêt, peut être suspendue de façon
//! interactive (spec §4.4) — tout le reste de cette charge utile ne réagit
//! qu'aux événements que la VM délivre déjà d'elle-même.

use crate::{signals, state};
use hook_core::mailbox::{self, HookInstallRequest, MailboxCommand};
use std::os::raw::{c_int, c_void};
use std::sync::atomic::Ordering;
use std::time::Duration;

/// Intervalle de sondage (spec §4.4 : "dort ~100 ms entre les itérations").
const POLL_INTERVAL: Duration = Duration::from_millis(100);

type HookInstallFn = unsafe extern "C" fn(vm_state: *mut c_void, hook: *mut c_void, mask: c_int, count: c_int) -> c_int;

/// Lance le thread worker. Nommé (pas un simple `thread::spawn`) pour
/// qu'une panique à l'intérieur soit attribuable dans un crash dump, et
/// enveloppé dans `catch_unwind` pour qu'une panique non gérée ne puisse pas
/// laisser silencieusement une session de debugger en pause avec la boîte
/// aux lettres à moitié servie (note spec §4.4 dans SPEC_FULL.md).
pub fn spawn() -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("vm-debug-hook-async".to_string())
        .spawn(run_loop)
}

fn run_loop() {
    loop {
        std::thread::sleep(POLL_INTERVAL);
        let outcome = std::panic::catch_unwind(poll_once);
        match outcome {
            Ok(true) => continue,
            Ok(false) => break,
            Err(_) => {
                #[cfg(feature = "trace")]
                log::error!("vm-debug-hook-async: panicked while servicing a poll; continuing");
                continue;
            }
        }
    }
}

/// Sert un cycle de sondage. Renvoie `false` quand le worker doit s'arrêter.
fn poll_once() -> bool {
    let code = state::ASYNC_BREAK_CODE.load(Ordering::Relaxed);
    if code == 0 {
        return true;
    }

    // Déclenché avant le service, au tout premier sondage où du travail est
    // apparu — la chance du debugger d'arrêter l'hôte (spec §4.4).
    signals::on_async_break();

    let data = read_mailbox_data();
    let command = mailbox::decode(code, &data);
    let keep_running = match command {
        MailboxCommand::Idle | MailboxCommand::Wake => true,
        MailboxCommand::Arm(req) | MailboxCommand::Disarm(req) => {
            service_install_request(&req);
            true
        }
        MailboxCommand::Shutdown => false,
    };

    state::ASYNC_BREAK_CODE.store(0, Ordering::Relaxed);
    keep_running
}

fn read_mailbox_data() -> Vec<usize> {
    // SAFETY: lecture-snapshot d'un buffer que le debugger promet de ne pas
    // muter en même temps qu'un `async_break_code` non nul (spec §5).
    let data = unsafe { &*state::async_break_data_ptr() };
    data.to_vec()
}

/// Appelle la fonction d'installation de hook fournie par le debugger une
/// fois par état VM dans `req.vm_states`, en ignorant les échecs par état
/// (spec §7 : "le worker ignore" une erreur d'installation et "l'entrée
/// suivante de la liste est quand même tentée").
fn service_install_request(req: &HookInstallRequest) {
    if req.install_fn == 0 {
        return;
    }
    // SAFETY: le debugger est contractuellement tenu de remplir `data[0]`
    // avec un pointeur de fonction `(vm_state, hook, mask, count) -> int`
    // valide avant d'écrire un `async_break_code` non nul (spec §4.4).
    let install: HookInstallFn = unsafe { std::mem::transmute(req.install_fn) };
    for &vm_state in &req.vm_states {
        let _rc = unsafe {
            install(
                vm_state as *mut c_void,
                req.hook_entry_fn as *mut c_void,
                req.mask,
                0,
            )
        };
    }
}
