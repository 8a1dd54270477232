//! attach.rs — Initialisation unique à l'attachement de la bibliothèque (cycle de vie spec §6)
//!
//! Le `dllmain.cpp` original fait ceci dans le cas `DLL_PROCESS_ATTACH` de
//! `DllMain`, le seul hook spécifique à Windows qu'un `cdylib` lié
//! statiquement obtient gratuitement. `ctor` donne la même garantie
//! "s'exécute une fois, le plus tôt possible, avant que quoi que ce soit
//! dans l'hôte n'appelle cette bibliothèque" sur chaque plateforme ciblée par
//! le debugger (`.init_array` sous Linux, `__DATA,__mod_init_func` sous
//! macOS, `DllMain` sous le capot pour Windows) sans que cette crate n'ait à
//! coder à la main des attributs de constructeur par plateforme.
//!
//! Il n'y a délibérément pas de hook de détachement correspondant (spec §6 :
//! "il n'y a pas de détachement ordonné — l'hôte se termine ou la
//! bibliothèque reste chargée").

use crate::{signals, state, worker};
use std::sync::atomic::Ordering;
use std::sync::OnceLock;

/// Garde vivant le `JoinHandle` du thread worker pour la durée de vie du
/// processus. Rien ne le rejoint jamais — la sortie de l'hôte est en
/// pratique le seul chemin d'arrêt sur lequel cette charge utile compte, un
/// code d'arrêt de boîte aux lettres explicite (§9) restant disponible pour
/// un debugger qui veut un arrêt propre.
static WORKER: OnceLock<std::thread::JoinHandle<()>> = OnceLock::new();

// Désactivé sous `cfg(test)` : les tests unitaires ci-dessous pilotent
// directement et de façon synchrone la boîte aux lettres et les statics
// d'état de pas, et un worker d'arrière-plan vivant sondant les mêmes
// statics toutes les ~100 ms les mettrait en compétition.
#[cfg_attr(not(test), ctor::ctor)]
#[cfg_attr(test, allow(dead_code))]
fn on_attach() {
    init_logging();

    capture_working_directory();

    match worker::spawn() {
        Ok(handle) => {
            let _ = WORKER.set(handle);
        }
        Err(_err) => {
            #[cfg(feature = "trace")]
            log::error!("vm-debug-hook: failed to spawn async-break worker: {_err}");
        }
    }

    state::INITIALIZED.store(1, Ordering::Relaxed);
    signals::on_initialized();
}

#[cfg(feature = "trace")]
fn init_logging() {
    // `try_init` plutôt que `init` : un hôte qui a déjà installé son propre
    // `env_logger` (ou lié une autre copie de cette bibliothèque) ne doit pas
    // faire paniquer ce constructeur.
    let _ = env_logger::try_init();
}

#[cfg(not(feature = "trace"))]
fn init_logging() {}

fn capture_working_directory() {
    let cwd = std::env::current_dir().unwrap_or_default();
    let bytes = cwd.to_string_lossy();
    let bytes = bytes.as_bytes();
    let len = bytes.len().min(state::WORKING_DIRECTORY_LEN - 1);

    // SAFETY: s'exécute une fois, avant que le thread worker ou tout point
    // d'entrée de hook ne puisse observer `WORKING_DIRECTORY`, donc pas
    // d'accès concurrent encore possible.
    let buf = unsafe { &mut *state::working_directory_ptr() };
    buf[..len].copy_from_slice(&bytes[..len]);
    buf[len] = 0;
}
