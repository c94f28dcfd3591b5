//! Pointer handling, independent of rendering. The front end reports presses,
//! movement and releases in screen pixels together with the cell under the
//! pointer; the controller turns them into discrete intents.

use tracing::trace;

use crate::effects::SpecialTile;
use crate::grid::{Grid, CELL_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    /// Pressed on a board cell.
    Press { cell: usize, at: Point },
    /// Picked up a bomb or crystal from the inventory.
    PressSpecial { kind: SpecialTile },
    Move { at: Point, over: Option<usize> },
    Release { over: Option<usize> },
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragState {
    pub origin: usize,
    pub target: usize,
    pub axis: Option<Axis>,
    /// Visual displacement of the dragged tile, locked to `axis` and clamped to one tile.
    pub offset: Point,
    start: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InputState {
    #[default]
    Idle,
    Dragging(DragState),
    Aiming {
        kind: SpecialTile,
        over: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Swap { from: usize, to: usize },
    Special { kind: SpecialTile, index: usize },
}

#[derive(Debug, Clone)]
pub struct InputController {
    state: InputState,
    tile_size: f32,
    jitter: f32,
}

impl InputController {
    pub fn new(tile_size: f32, jitter: f32) -> Self {
        Self {
            state: InputState::Idle,
            tile_size,
            jitter,
        }
    }

    pub fn state(&self) -> &InputState {
        &self.state
    }

    pub fn drag(&self) -> Option<&DragState> {
        match &self.state {
            InputState::Dragging(drag) => Some(drag),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == InputState::Idle
    }

    /// Board tiles can be resized by the front end at any time.
    pub fn set_tile_size(&mut self, tile_size: f32) {
        self.tile_size = tile_size;
    }

    /// `allowed` is whether the board currently accepts input: session active,
    /// no cascade animating, no upgrade offer open.
    pub fn handle(&mut self, event: PointerEvent, allowed: bool) -> Option<Intent> {
        match event {
            PointerEvent::Press { cell, at } => {
                self.press(cell, at, allowed);
                None
            }
            PointerEvent::PressSpecial { kind } => {
                self.press_special(kind, allowed);
                None
            }
            PointerEvent::Move { at, over } => {
                self.movement(at, over, allowed);
                None
            }
            PointerEvent::Release { over } => self.release(over, allowed),
            PointerEvent::Cancel => {
                self.cancel();
                None
            }
        }
    }

    pub fn press(&mut self, cell: usize, at: Point, allowed: bool) -> bool {
        if !allowed || !self.is_idle() || cell >= CELL_COUNT {
            return false;
        }
        self.state = InputState::Dragging(DragState {
            origin: cell,
            target: cell,
            axis: None,
            offset: Point::default(),
            start: at,
        });
        true
    }

    pub fn press_special(&mut self, kind: SpecialTile, allowed: bool) -> bool {
        if !allowed || !self.is_idle() {
            return false;
        }
        self.state = InputState::Aiming { kind, over: None };
        true
    }

    pub fn movement(&mut self, at: Point, over: Option<usize>, allowed: bool) {
        let tile = self.tile_size;
        let jitter = self.jitter;
        match &mut self.state {
            InputState::Idle => {}
            InputState::Aiming { over: hovered, .. } => {
                *hovered = over.filter(|&cell| cell < CELL_COUNT);
            }
            InputState::Dragging(drag) => {
                if allowed {
                    track_drag(drag, at, tile, jitter);
                }
            }
        }
    }

    pub fn release(&mut self, over: Option<usize>, allowed: bool) -> Option<Intent> {
        let state = std::mem::take(&mut self.state);
        if !allowed {
            return None;
        }
        match state {
            InputState::Idle => None,
            InputState::Dragging(drag) if drag.target != drag.origin => {
                trace!(from = drag.origin, to = drag.target, "swap intent");
                Some(Intent::Swap {
                    from: drag.origin,
                    to: drag.target,
                })
            }
            InputState::Dragging(_) => None,
            InputState::Aiming { kind, over: hovered } => over
                .or(hovered)
                .filter(|&cell| cell < CELL_COUNT)
                .map(|index| Intent::Special { kind, index }),
        }
    }

    pub fn cancel(&mut self) {
        self.state = InputState::Idle;
    }
}

fn track_drag(drag: &mut DragState, at: Point, tile: f32, jitter: f32) {
    let dx = at.x - drag.start.x;
    let dy = at.y - drag.start.y;

    let axis = match drag.axis {
        Some(axis) => axis,
        None => {
            if dx.abs().max(dy.abs()) < jitter {
                return;
            }
            let axis = if dx.abs() >= dy.abs() {
                Axis::Horizontal
            } else {
                Axis::Vertical
            };
            drag.axis = Some(axis);
            axis
        }
    };

    let along = match axis {
        Axis::Horizontal => dx,
        Axis::Vertical => dy,
    };
    let limit = tile.max(0.0);
    let clamped = along.clamp(-limit, limit);
    drag.offset = match axis {
        Axis::Horizontal => Point::new(clamped, 0.0),
        Axis::Vertical => Point::new(0.0, clamped),
    };

    let step: isize = if clamped > 0.0 { 1 } else { -1 };
    let neighbour = if tile > 0.0 && clamped.abs() >= tile / 2.0 {
        match axis {
            Axis::Horizontal => Grid::offset(drag.origin, 0, step),
            Axis::Vertical => Grid::offset(drag.origin, step, 0),
        }
    } else {
        None
    };
    drag.target = neighbour.unwrap_or(drag.origin);
}
