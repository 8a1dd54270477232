//! mailbox.rs — Protocole de boîte aux lettres d'arrêt asynchrone (spec.md §3, §4.4)
//!
//! Logique de décodage pure pour la boîte aux lettres adressable par mot que
//! le debugger sonde. `hook-abi` possède les vraies statics exportées
//! `async_break_code` / `async_break_data` et le thread worker qui les lit ;
//! ce module sait seulement transformer `(code, data)` en commande typée,
//! donc les règles d'encodage (quel mot signifie quoi) ont un seul
//! propriétaire et un seul jeu de tests, indépendant de tout thread ou
//! mémoire brute.
//!
//! La question ouverte de §9 — la source d'origine infère l'arrêt depuis
//! "tout autre code non nul après service", ce qui crée une course entre le
//! service et la vérification — est résolue ici comme la spec le
//! recommande : une constante [`SHUTDOWN_CODE`] explicite. Tout autre code
//! non nul non reconnu arrête quand même le worker (pour qu'un debugger
//! construit contre l'ancienne convention temporelle continue de
//! fonctionner), ce n'est simplement plus la *seule* façon de demander
//! l'arrêt.

/// Capacité du tableau de mots exporté `async_break_data`.
pub const MAILBOX_DATA_LEN: usize = 1024;

/// Code d'arrêt explicite recommandé par spec.md §9, résolvant la question
/// ouverte sur la détection d'arrêt par code sujette aux courses.
pub const SHUTDOWN_CODE: u32 = 0xFFFF_FFFF;

const CODE_IDLE: u32 = 0;
const CODE_WAKE: u32 = 1;
const CODE_ARM: u32 = 2;
const CODE_DISARM: u32 = 4;

/// Requête `(vm_state, hook, mask, count) -> int` décodée depuis `data[0..]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookInstallRequest {
    /// Adresse de la propre fonction d'installation de hook de la VM.
    pub install_fn: usize,
    /// Adresse du point d'entrée de hook à installer.
    pub hook_entry_fn: usize,
    /// Pointeurs d'état VM sur lesquels installer/désinstaller, dans l'ordre.
    pub vm_states: Vec<usize>,
    /// Argument `mask` : `7` (CALL|RET|LINE) pour armer, `0` pour désarmer.
    pub mask: i32,
}

/// Une commande de boîte aux lettres décodée.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailboxCommand {
    /// Rien à faire ; continuer de dormir.
    Idle,
    /// Réveil no-op ; vaut quand même la peine de déclencher le signal
    /// d'arrêt asynchrone (§4.4).
    Wake,
    /// "Arme le hook sur ces états VM" (code `2`).
    Arm(HookInstallRequest),
    /// "Efface le hook sur ces états VM" (code `4`).
    Disarm(HookInstallRequest),
    /// Demande d'arrêt — arrêter le sondage et sortir de la boucle du worker.
    Shutdown,
}

/// S'abonne à CALL | RET | LINE (spec.md §4.4 : "masque 7").
pub const ARM_MASK: i32 = 0b111;
/// Se désabonne de tout.
pub const DISARM_MASK: i32 = 0;

#[cfg(feature = "trace")]
fn log_overrun() {
    log::debug!("{}", crate::error::HookError::MailboxOverrun);
}
#[cfg(not(feature = "trace"))]
fn log_overrun() {}

/// Décode `(code, data)` en [`MailboxCommand`]. `data` est censé faire
/// [`MAILBOX_DATA_LEN`] mots mais cette fonction ne lit que ce dont la liste
/// encodée a réellement besoin.
///
/// La liste d'états VM dans `data[2..]` est terminée par NUL (un mot `0` la
/// termine) ; si aucun terminateur n'apparaît avant la fin de `data`, la
/// liste est quand même renvoyée telle que décodée jusque-là — `hook-abi` est
/// responsable de ne jamais passer à cette fonction plus de
/// [`MAILBOX_DATA_LEN`] mots, donc une liste non terminée ici reflète une
/// écriture malformée du debugger, pas de la mémoire que cette fonction
/// pourrait sans risque continuer à lire.
pub fn decode(code: u32, data: &[usize]) -> MailboxCommand {
    match code {
        CODE_IDLE => MailboxCommand::Idle,
        CODE_WAKE => MailboxCommand::Wake,
        CODE_ARM | CODE_DISARM => {
            let install_fn = data.first().copied().unwrap_or(0);
            let hook_entry_fn = data.get(1).copied().unwrap_or(0);
            let rest = data.iter().skip(2);
            let vm_states: Vec<usize> = rest.clone().take_while(|&&w| w != 0).copied().collect();
            if rest.count() == vm_states.len() {
                log_overrun();
            }
            let mask = if code == CODE_ARM { ARM_MASK } else { DISARM_MASK };
            let req = HookInstallRequest {
                install_fn,
                hook_entry_fn,
                vm_states,
                mask,
            };
            if code == CODE_ARM {
                MailboxCommand::Arm(req)
            } else {
                MailboxCommand::Disarm(req)
            }
        }
        _ => MailboxCommand::Shutdown,
    }
}
