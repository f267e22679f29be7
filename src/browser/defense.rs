//! Couche de défense contre la publicité du site cible.
//!
//! Deux scripts complémentaires:
//! - **verrouillage**: neutralise les API d'ouverture de fenêtres
//!   (`window.open`, `alert`, `confirm`, `prompt`) et retire l'attribut
//!   `target="_blank"` des liens au moment du clic. Pré-injecté sur chaque
//!   nouveau document à la création de la session, puis rejoué à la demande.
//! - **balayage**: retire du DOM les nœuds répondant à l'heuristique
//!   superposition/publicité. Un nœud est éliminé si l'une des conditions
//!   tient: z-index au-dessus du seuil; identifiant contenant un mot du
//!   vocabulaire publicitaire (insensible à la casse); position fixe couvrant
//!   la quasi-totalité du viewport; position fixe avec les deux dimensions
//!   au-delà de 300 px; iframe dont la source référence une régie connue.
//!
//! Les deux scripts sont idempotents: les rejouer sur le même document ne
//! fait que re-balayer sans autre effet. Les exceptions par nœud sont
//! avalées côté page, une structure inhabituelle ne doit jamais faire
//! échouer l'automatisation.
use crate::browser::driver::{Driver, DriverResult};

/// Neutralisation des API de popup et des cibles `_blank`.
pub const POPUP_LOCK_JS: &str = r#"
(() => {
    const noop = () => null;
    document.addEventListener('click', (event) => {
        let el = event.target;
        while (el && el !== document.body) {
            if (el.tagName === 'A' && el.target === '_blank') {
                el.removeAttribute('target');
            }
            el = el.parentElement;
        }
    }, true);
    try {
        Object.defineProperty(window, 'open', { value: noop, writable: false });
    } catch (_) {
        window.open = noop;
    }
    window.alert = noop;
    window.confirm = () => false;
    window.prompt = noop;
    window.print = () => {};
})();
"#;

/// Balayage des superpositions et régies publicitaires du document courant.
pub const OVERLAY_SWEEP_JS: &str = r#"
const candidates = Array.from(document.querySelectorAll('*'));
candidates.forEach((el) => {
    try {
        const styles = window.getComputedStyle(el);
        const z = parseInt(styles.zIndex || '0', 10);
        const hasOverlayId = el.id && ['adbd', 'preloader', 'modal', 'popup', 'ad', 'banner', 'overlay']
            .some(id => el.id.toLowerCase().includes(id));
        const isFullscreen = styles.position === 'fixed' && (styles.width === '100%' || styles.height === '100%');
        const isLargeOverlay = styles.position === 'fixed'
            && parseInt(styles.width || '0') > 300 && parseInt(styles.height || '0') > 300;
        const isAdIframe = el.tagName === 'IFRAME' && el.src
            && (el.src.includes('ads') || el.src.includes('doubleclick') || el.src.includes('googlesyndication'));
        if (z > 1000 || hasOverlayId || isFullscreen || isLargeOverlay || isAdIframe) {
            el.remove();
        }
    } catch (e) {}
});
document.querySelectorAll('[role="dialog"], .modal, .popup, .overlay, .ad-container').forEach(el => el.remove());
document.querySelectorAll('script[src*="ads"], script[src*="popup"], script[src*="banner"]').forEach(el => el.remove());
window.open = function() { return null; };
window.alert = function() {};
window.confirm = function() { return false; };
window.prompt = function() { return null; };
if (document.body) { document.body.style.overflow = 'auto'; }
"#;

/// Balaye le contexte de focus courant (document de premier niveau ou frame).
pub async fn sweep_overlays<D: Driver>(driver: &D) -> DriverResult<()> {
    driver.execute(OVERLAY_SWEEP_JS, Vec::new()).await?;
    Ok(())
}

/// Rejoue le verrouillage des popups sur le document courant.
pub async fn lock_popups<D: Driver>(driver: &D) -> DriverResult<()> {
    driver.execute(POPUP_LOCK_JS, Vec::new()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::FakeDriver;

    #[tokio::test]
    async fn sweep_execute_le_script_de_balayage() {
        let driver = FakeDriver::new();
        sweep_overlays(&driver).await.unwrap();
        sweep_overlays(&driver).await.unwrap();
        assert_eq!(driver.executed_count(OVERLAY_SWEEP_JS), 2);
    }

    #[test]
    fn les_scripts_neutralisent_les_api_de_popup() {
        assert!(POPUP_LOCK_JS.contains("Object.defineProperty(window, 'open'"));
        for api in ["window.alert", "window.confirm", "window.prompt"] {
            assert!(POPUP_LOCK_JS.contains(api), "{api} absent du verrouillage");
        }
        for api in ["window.open", "window.alert", "window.confirm", "window.prompt"] {
            assert!(OVERLAY_SWEEP_JS.contains(api), "{api} absent du balayage");
        }
    }
}
