//! Per-tick input sampling with press detection and menu gating

/// Two-axis analog value (move or look)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Axis2 {
    pub x: f32,
    pub y: f32,
}

impl Axis2 {
    pub const ZERO: Axis2 = Axis2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Raw device state for one tick, as handed over by the input layer
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawInput {
    pub move_axis: Axis2,
    pub look_axis: Axis2,
    pub jump_down: bool,
    pub interact_down: bool,
    pub escape_down: bool,
    pub fullscreen_down: bool,
}

/// What gameplay code sees for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputSample {
    pub move_axis: Axis2,
    pub look_axis: Axis2,
    pub jump: bool,
    pub interact_pressed: bool,
}

/// Turns raw device state into gameplay samples.
///
/// Buttons fire on the press edge (current && !previous). Escape flips the
/// menu state; while the menu is open every gameplay sample is neutral.
pub struct InputManager {
    menu_open: bool,
    fullscreen: bool,

    // Previous tick button states for edge detection
    prev_jump: bool,
    prev_interact: bool,
    prev_escape: bool,
    prev_fullscreen: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            menu_open: false,
            fullscreen: false,
            prev_jump: false,
            prev_interact: false,
            prev_escape: false,
            prev_fullscreen: false,
        }
    }

    pub fn update(&mut self, raw: &RawInput) -> InputSample {
        let jump_pressed = raw.jump_down && !self.prev_jump;
        let interact_pressed = raw.interact_down && !self.prev_interact;

        if raw.escape_down && !self.prev_escape {
            self.menu_open = !self.menu_open;
        }
        if raw.fullscreen_down && !self.prev_fullscreen {
            self.fullscreen = !self.fullscreen;
        }

        self.prev_jump = raw.jump_down;
        self.prev_interact = raw.interact_down;
        self.prev_escape = raw.escape_down;
        self.prev_fullscreen = raw.fullscreen_down;

        if self.menu_open {
            return InputSample::default();
        }

        InputSample {
            move_axis: raw.move_axis,
            look_axis: raw.look_axis,
            jump: jump_pressed,
            interact_pressed,
        }
    }

    pub fn menu_open(&self) -> bool {
        self.menu_open
    }

    pub fn fullscreen(&self) -> bool {
        self.fullscreen
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
