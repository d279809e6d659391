//! Pointer input state machine.
//!
//! Turns raw pointer, wheel and key events into high-level intents. All state
//! that decides between panning and annotating (whether the pan modifier is
//! held, whether a drag is in progress, whether the current press has panned)
//! lives here and is fed by the events themselves.

use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationMode;
use crate::config::ViewerConfig;
use crate::model::Point;

/// Mouse/pointer buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    /// Left button or primary touch
    Primary,
    /// Right button
    Secondary,
    Middle,
    Other(u16),
}

/// Keyboard modifiers carried on every pointer event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }
}

/// Which modifier key turns a press into a pan drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifierKey {
    #[default]
    Shift,
    Control,
    Alt,
    Meta,
}

impl ModifierKey {
    /// Whether this modifier is down in `modifiers`.
    pub fn is_held(&self, modifiers: Modifiers) -> bool {
        match self {
            ModifierKey::Shift => modifiers.shift,
            ModifierKey::Control => modifiers.ctrl,
            ModifierKey::Alt => modifiers.alt,
            ModifierKey::Meta => modifiers.meta,
        }
    }
}

/// Keys the controller cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Modifier(ModifierKey),
    Char(char),
    Other,
}

/// Raw input events, positions in screen space relative to the container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down {
        position: Point,
        button: PointerButton,
        modifiers: Modifiers,
    },
    Move {
        position: Point,
        modifiers: Modifiers,
    },
    Up {
        position: Point,
        button: PointerButton,
        modifiers: Modifiers,
    },
    /// Pointer left the container
    Leave,
    /// Wheel scrolled; positive `delta_y` scrolls towards the bottom of the page
    Wheel { position: Point, delta_y: f64 },
    /// The host is about to open its context menu
    ContextMenu { position: Point },
    KeyDown { key: Key, modifiers: Modifiers },
    KeyUp { key: Key, modifiers: Modifiers },
}

/// Direction for image navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Previous,
    Next,
}

/// What the host should do in response to an event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    /// Move the image by a screen-space delta
    PanBy(Point),
    /// Zoom one notch at a screen point; sign as in [`PointerEvent::Wheel`]
    ZoomAt { point: Point, delta_sign: f64 },
    /// A click that should place an annotation. The point is still in
    /// screen space; the caller maps and bounds-checks it.
    Annotate { screen_point: Point, include: bool },
    /// Switch to the previous/next image
    Navigate(Step),
    /// Prevent the native context menu so secondary clicks can annotate
    SuppressContextMenu,
}

/// Cursor the host should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorHint {
    Crosshair,
    Grab,
    Grabbing,
}

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PointerState {
    #[default]
    Idle,
    Panning {
        /// Last pointer position, used for the next delta
        last: Point,
    },
}

/// A button press waiting for its release.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Press {
    button: PointerButton,
    /// Panning was entered at some point during this press
    panned: bool,
}

/// Disambiguates pan drags from annotation clicks.
#[derive(Debug, Clone)]
pub struct PointerInputController {
    pan_modifier: ModifierKey,
    allow_zoom: bool,
    mode: AnnotationMode,
    state: PointerState,
    press: Option<Press>,
    modifier_held: bool,
}

impl PointerInputController {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            pan_modifier: config.pan_modifier,
            allow_zoom: config.allow_zoom,
            mode: config.annotation_mode,
            state: PointerState::Idle,
            press: None,
            modifier_held: false,
        }
    }

    pub fn state(&self) -> PointerState {
        self.state
    }

    pub fn is_panning(&self) -> bool {
        matches!(self.state, PointerState::Panning { .. })
    }

    pub fn mode(&self) -> AnnotationMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: AnnotationMode) {
        self.mode = mode;
    }

    pub fn cursor(&self) -> CursorHint {
        if self.is_panning() {
            CursorHint::Grabbing
        } else if self.modifier_held {
            CursorHint::Grab
        } else {
            CursorHint::Crosshair
        }
    }

    /// Feed one event and get back at most one intent.
    pub fn handle(&mut self, event: PointerEvent) -> Option<Intent> {
        match event {
            PointerEvent::Down {
                position,
                button,
                modifiers,
            } => {
                self.track_modifiers(modifiers);
                if self.modifier_held {
                    self.state = PointerState::Panning { last: position };
                    self.press = Some(Press {
                        button,
                        panned: true,
                    });
                    log::debug!("Pan drag started at ({:.1}, {:.1})", position.x, position.y);
                } else {
                    self.press = Some(Press {
                        button,
                        panned: false,
                    });
                }
                None
            }
            PointerEvent::Move {
                position,
                modifiers,
            } => {
                self.track_modifiers(modifiers);
                let PointerState::Panning { last } = self.state else {
                    return None;
                };
                self.state = PointerState::Panning { last: position };
                let delta = position - last;
                if delta == Point::ZERO {
                    return None;
                }
                Some(Intent::PanBy(delta))
            }
            PointerEvent::Up {
                position,
                button,
                modifiers,
            } => {
                self.track_modifiers(modifiers);
                let press = self.press.take();
                if self.is_panning() {
                    self.state = PointerState::Idle;
                    log::debug!("Pan drag ended");
                    return None;
                }
                let press = press?;
                if press.panned || press.button != button || self.modifier_held {
                    return None;
                }
                self.click_intent(position, button)
            }
            PointerEvent::Leave => {
                if self.is_panning() {
                    log::debug!("Pan drag ended (pointer left)");
                }
                self.state = PointerState::Idle;
                self.press = None;
                None
            }
            PointerEvent::Wheel { position, delta_y } => {
                if !self.allow_zoom || delta_y == 0.0 || !delta_y.is_finite() {
                    return None;
                }
                Some(Intent::ZoomAt {
                    point: position,
                    delta_sign: delta_y.signum(),
                })
            }
            PointerEvent::ContextMenu { .. } => Some(Intent::SuppressContextMenu),
            PointerEvent::KeyDown { key, modifiers } => {
                self.track_modifiers(modifiers);
                match key {
                    Key::Modifier(k) if k == self.pan_modifier => {
                        self.modifier_held = true;
                        None
                    }
                    Key::Char('a') if !self.is_panning() => Some(Intent::Navigate(Step::Previous)),
                    Key::Char('d') if !self.is_panning() => Some(Intent::Navigate(Step::Next)),
                    _ => None,
                }
            }
            PointerEvent::KeyUp { key, modifiers } => {
                self.track_modifiers(modifiers);
                if key == Key::Modifier(self.pan_modifier) {
                    self.modifier_held = false;
                }
                None
            }
        }
    }

    fn track_modifiers(&mut self, modifiers: Modifiers) {
        self.modifier_held = self.pan_modifier.is_held(modifiers);
    }

    fn click_intent(&self, position: Point, button: PointerButton) -> Option<Intent> {
        let include = match (button, self.mode) {
            (PointerButton::Primary, _) => true,
            (PointerButton::Secondary, AnnotationMode::Segmentation) => false,
            _ => return None,
        };
        Some(Intent::Annotate {
            screen_point: position,
            include,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(mode: AnnotationMode) -> PointerInputController {
        let config = ViewerConfig {
            annotation_mode: mode,
            ..ViewerConfig::default()
        };
        PointerInputController::new(&config)
    }

    fn down(x: f64, y: f64, button: PointerButton, modifiers: Modifiers) -> PointerEvent {
        PointerEvent::Down {
            position: Point::new(x, y),
            button,
            modifiers,
        }
    }

    fn up(x: f64, y: f64, button: PointerButton, modifiers: Modifiers) -> PointerEvent {
        PointerEvent::Up {
            position: Point::new(x, y),
            button,
            modifiers,
        }
    }

    fn moved(x: f64, y: f64, modifiers: Modifiers) -> PointerEvent {
        PointerEvent::Move {
            position: Point::new(x, y),
            modifiers,
        }
    }

    #[test]
    fn test_click_emits_annotate() {
        let mut c = controller(AnnotationMode::SinglePoint);
        assert_eq!(
            c.handle(down(100.0, 100.0, PointerButton::Primary, Modifiers::NONE)),
            None
        );
        assert_eq!(
            c.handle(up(100.0, 100.0, PointerButton::Primary, Modifiers::NONE)),
            Some(Intent::Annotate {
                screen_point: Point::new(100.0, 100.0),
                include: true
            })
        );
        assert_eq!(c.state(), PointerState::Idle);
    }

    #[test]
    fn test_shift_drag_pans() {
        let mut c = controller(AnnotationMode::SinglePoint);
        c.handle(down(10.0, 10.0, PointerButton::Primary, Modifiers::shift()));
        assert!(c.is_panning());
        assert_eq!(c.cursor(), CursorHint::Grabbing);

        assert_eq!(
            c.handle(moved(15.0, 8.0, Modifiers::shift())),
            Some(Intent::PanBy(Point::new(5.0, -2.0)))
        );
        assert_eq!(
            c.handle(moved(20.0, 8.0, Modifiers::shift())),
            Some(Intent::PanBy(Point::new(5.0, 0.0)))
        );
        // No movement, no delta
        assert_eq!(c.handle(moved(20.0, 8.0, Modifiers::shift())), None);

        assert_eq!(
            c.handle(up(20.0, 8.0, PointerButton::Primary, Modifiers::shift())),
            None
        );
        assert_eq!(c.state(), PointerState::Idle);
    }

    #[test]
    fn test_release_after_pan_never_annotates() {
        let mut c = controller(AnnotationMode::Segmentation);
        c.handle(down(10.0, 10.0, PointerButton::Primary, Modifiers::shift()));
        c.handle(moved(50.0, 50.0, Modifiers::shift()));
        // Shift released before the button
        c.handle(PointerEvent::KeyUp {
            key: Key::Modifier(ModifierKey::Shift),
            modifiers: Modifiers::NONE,
        });
        assert_eq!(
            c.handle(up(50.0, 50.0, PointerButton::Primary, Modifiers::NONE)),
            None
        );
    }

    #[test]
    fn test_move_without_pan_does_nothing() {
        let mut c = controller(AnnotationMode::SinglePoint);
        assert_eq!(c.handle(moved(1.0, 1.0, Modifiers::NONE)), None);
        c.handle(down(1.0, 1.0, PointerButton::Primary, Modifiers::NONE));
        assert_eq!(c.handle(moved(30.0, 30.0, Modifiers::NONE)), None);
        assert!(!c.is_panning());
    }

    #[test]
    fn test_leave_ends_pan() {
        let mut c = controller(AnnotationMode::SinglePoint);
        c.handle(down(0.0, 0.0, PointerButton::Primary, Modifiers::shift()));
        c.handle(PointerEvent::Leave);
        assert_eq!(c.state(), PointerState::Idle);
        assert_eq!(c.handle(moved(5.0, 5.0, Modifiers::shift())), None);
        // The release that follows the leave is not a click
        assert_eq!(
            c.handle(up(5.0, 5.0, PointerButton::Primary, Modifiers::NONE)),
            None
        );
    }

    #[test]
    fn test_wheel_zooms_even_while_panning() {
        let mut c = controller(AnnotationMode::SinglePoint);
        c.handle(down(0.0, 0.0, PointerButton::Primary, Modifiers::shift()));
        assert_eq!(
            c.handle(PointerEvent::Wheel {
                position: Point::new(4.0, 5.0),
                delta_y: -120.0
            }),
            Some(Intent::ZoomAt {
                point: Point::new(4.0, 5.0),
                delta_sign: -1.0
            })
        );
        assert!(c.is_panning());
    }

    #[test]
    fn test_wheel_ignored_when_zoom_disabled() {
        let config = ViewerConfig {
            allow_zoom: false,
            ..ViewerConfig::default()
        };
        let mut c = PointerInputController::new(&config);
        assert_eq!(
            c.handle(PointerEvent::Wheel {
                position: Point::ZERO,
                delta_y: 1.0
            }),
            None
        );
    }

    #[test]
    fn test_secondary_click_excludes_in_segmentation() {
        let mut c = controller(AnnotationMode::Segmentation);
        c.handle(down(3.0, 4.0, PointerButton::Secondary, Modifiers::NONE));
        assert_eq!(
            c.handle(up(3.0, 4.0, PointerButton::Secondary, Modifiers::NONE)),
            Some(Intent::Annotate {
                screen_point: Point::new(3.0, 4.0),
                include: false
            })
        );
    }

    #[test]
    fn test_secondary_click_ignored_outside_segmentation() {
        let mut c = controller(AnnotationMode::SinglePoint);
        c.handle(down(3.0, 4.0, PointerButton::Secondary, Modifiers::NONE));
        assert_eq!(
            c.handle(up(3.0, 4.0, PointerButton::Secondary, Modifiers::NONE)),
            None
        );

        c.handle(down(3.0, 4.0, PointerButton::Middle, Modifiers::NONE));
        assert_eq!(
            c.handle(up(3.0, 4.0, PointerButton::Middle, Modifiers::NONE)),
            None
        );
    }

    #[test]
    fn test_context_menu_suppressed() {
        let mut c = controller(AnnotationMode::Segmentation);
        assert_eq!(
            c.handle(PointerEvent::ContextMenu {
                position: Point::ZERO
            }),
            Some(Intent::SuppressContextMenu)
        );
    }

    #[test]
    fn test_modifier_key_changes_cursor() {
        let mut c = controller(AnnotationMode::SinglePoint);
        assert_eq!(c.cursor(), CursorHint::Crosshair);
        c.handle(PointerEvent::KeyDown {
            key: Key::Modifier(ModifierKey::Shift),
            modifiers: Modifiers::shift(),
        });
        assert_eq!(c.cursor(), CursorHint::Grab);
        c.handle(PointerEvent::KeyUp {
            key: Key::Modifier(ModifierKey::Shift),
            modifiers: Modifiers::NONE,
        });
        assert_eq!(c.cursor(), CursorHint::Crosshair);
    }

    #[test]
    fn test_modifier_held_on_release_blocks_click() {
        let mut c = controller(AnnotationMode::SinglePoint);
        c.handle(down(3.0, 4.0, PointerButton::Primary, Modifiers::NONE));
        assert_eq!(
            c.handle(up(3.0, 4.0, PointerButton::Primary, Modifiers::shift())),
            None
        );
    }

    #[test]
    fn test_control_as_pan_modifier() {
        let config = ViewerConfig {
            pan_modifier: ModifierKey::Control,
            ..ViewerConfig::default()
        };
        let mut c = PointerInputController::new(&config);
        c.handle(down(0.0, 0.0, PointerButton::Primary, Modifiers::shift()));
        assert!(!c.is_panning());
        c.handle(PointerEvent::Leave);

        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::NONE
        };
        c.handle(down(0.0, 0.0, PointerButton::Primary, ctrl));
        assert!(c.is_panning());
    }

    #[test]
    fn test_navigation_keys() {
        let mut c = controller(AnnotationMode::SinglePoint);
        assert_eq!(
            c.handle(PointerEvent::KeyDown {
                key: Key::Char('d'),
                modifiers: Modifiers::NONE
            }),
            Some(Intent::Navigate(Step::Next))
        );
        assert_eq!(
            c.handle(PointerEvent::KeyDown {
                key: Key::Char('a'),
                modifiers: Modifiers::NONE
            }),
            Some(Intent::Navigate(Step::Previous))
        );
    }
}
