//! Key-to-action mapping, per scene.

use crate::app::Scene;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// User intents. The loop turns these into state changes and server calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum UiAction {
    Quit,
    HelpToggle,
    Back,
    Move(i16, i16),
    /// Context action on the cursor cell: plant when empty, harvest when
    /// ready, water when dry.
    CellAction,
    Water,
    WaterAll,
    Refresh,
    OpenShop,
    OpenSell,
    CycleSeed,
    MenuMove(i32),
    QtyAdjust(i32),
    Confirm,
    DebugXp,
}

pub(crate) fn map_key(scene: &Scene, ev: KeyEvent) -> Option<UiAction> {
    // Global, any scene.
    if matches!(ev.code, KeyCode::Char('x') | KeyCode::Char('X'))
        && ev.modifiers.contains(KeyModifiers::CONTROL)
    {
        return Some(UiAction::DebugXp);
    }
    match ev.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => return Some(UiAction::Quit),
        KeyCode::Char('?') => return Some(UiAction::HelpToggle),
        KeyCode::Esc => return Some(UiAction::Back),
        _ => {}
    }

    match scene {
        Scene::Farm => match ev.code {
            KeyCode::Up | KeyCode::Char('k') => Some(UiAction::Move(0, -1)),
            KeyCode::Down | KeyCode::Char('j') => Some(UiAction::Move(0, 1)),
            KeyCode::Left | KeyCode::Char('h') => Some(UiAction::Move(-1, 0)),
            KeyCode::Right | KeyCode::Char('l') => Some(UiAction::Move(1, 0)),
            KeyCode::Enter | KeyCode::Char(' ') => Some(UiAction::CellAction),
            KeyCode::Char('w') => Some(UiAction::Water),
            KeyCode::Char('W') => Some(UiAction::WaterAll),
            KeyCode::Char('r') | KeyCode::Char('R') => Some(UiAction::Refresh),
            KeyCode::Char('b') | KeyCode::Char('B') => Some(UiAction::OpenShop),
            KeyCode::Char('s') | KeyCode::Char('S') => Some(UiAction::OpenSell),
            KeyCode::Tab => Some(UiAction::CycleSeed),
            _ => None,
        },
        Scene::Shop { .. } | Scene::Sell { .. } => match ev.code {
            KeyCode::Up | KeyCode::Char('k') => Some(UiAction::MenuMove(-1)),
            KeyCode::Down | KeyCode::Char('j') => Some(UiAction::MenuMove(1)),
            KeyCode::Left | KeyCode::Char('h') => Some(UiAction::QtyAdjust(-1)),
            KeyCode::Right | KeyCode::Char('l') => Some(UiAction::QtyAdjust(1)),
            KeyCode::Char('+') => Some(UiAction::QtyAdjust(5)),
            KeyCode::Char('-') => Some(UiAction::QtyAdjust(-5)),
            KeyCode::Enter => Some(UiAction::Confirm),
            _ => None,
        },
        // Any key dismisses the celebration.
        Scene::LevelUp => Some(UiAction::Back),
        Scene::Help => match ev.code {
            KeyCode::Char('?') => Some(UiAction::Back),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn farm_scene_maps_movement_and_actions() {
        let farm = Scene::Farm;
        assert_eq!(map_key(&farm, key(KeyCode::Up)), Some(UiAction::Move(0, -1)));
        assert_eq!(map_key(&farm, key(KeyCode::Char('l'))), Some(UiAction::Move(1, 0)));
        assert_eq!(map_key(&farm, key(KeyCode::Enter)), Some(UiAction::CellAction));
        assert_eq!(map_key(&farm, key(KeyCode::Char('W'))), Some(UiAction::WaterAll));
        assert_eq!(map_key(&farm, key(KeyCode::Char('b'))), Some(UiAction::OpenShop));
    }

    #[test]
    fn quit_and_escape_work_everywhere() {
        for scene in [
            Scene::Farm,
            Scene::Shop { cursor: 0, qty: 1 },
            Scene::LevelUp,
            Scene::Help,
        ] {
            assert_eq!(map_key(&scene, key(KeyCode::Char('q'))), Some(UiAction::Quit));
            assert_eq!(map_key(&scene, key(KeyCode::Esc)), Some(UiAction::Back));
        }
    }

    #[test]
    fn shop_scene_adjusts_quantity() {
        let shop = Scene::Shop { cursor: 0, qty: 1 };
        assert_eq!(map_key(&shop, key(KeyCode::Right)), Some(UiAction::QtyAdjust(1)));
        assert_eq!(map_key(&shop, key(KeyCode::Char('+'))), Some(UiAction::QtyAdjust(5)));
        assert_eq!(map_key(&shop, key(KeyCode::Enter)), Some(UiAction::Confirm));
        // Farm-only keys do nothing in a modal.
        assert_eq!(map_key(&shop, key(KeyCode::Char('W'))), None);
    }

    #[test]
    fn any_key_dismisses_level_up() {
        assert_eq!(
            map_key(&Scene::LevelUp, key(KeyCode::Char('z'))),
            Some(UiAction::Back)
        );
    }

    #[test]
    fn debug_xp_requires_control() {
        let farm = Scene::Farm;
        let ctrl_x = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL);
        assert_eq!(map_key(&farm, ctrl_x), Some(UiAction::DebugXp));
        assert_eq!(map_key(&farm, key(KeyCode::Char('x'))), None);
    }
}
