// Copyright 2025 The DG Engine Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Frame-driver layers.
//!
//! A [`Layer`] is one slice of per-frame work (a game scene, a debug overlay).
//! The [`LayerStack`] owns the layers and drives them in order: regular layers
//! first, in attach order, then overlays. Events travel the other way, from
//! the topmost overlay down, and stop at the first layer that handles them.

/// Window and input events forwarded to layers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    WindowClosed,
    WindowResized { width: u32, height: u32 },
    KeyPressed { key: u32, repeat: bool },
    KeyReleased { key: u32 },
    MouseMoved { x: f32, y: f32 },
    MouseButtonPressed { button: u32 },
    MouseButtonReleased { button: u32 },
    MouseScrolled { x: f32, y: f32 },
}

/// A unit of per-frame work driven by a [`LayerStack`].
pub trait Layer {
    /// A non-empty name identifying the layer inside its stack.
    fn name(&self) -> &str;

    /// Overlays are always ordered after regular layers.
    fn is_overlay(&self) -> bool {
        false
    }

    /// Called once when the layer is attached to a stack.
    fn on_attach(&mut self) {}

    /// Called once when the layer is detached, including when its stack is dropped.
    fn on_detach(&mut self) {}

    /// Called at a fixed cadence with the fixed timestep in seconds.
    fn fixed_update(&mut self, _timestep: f32) {}

    /// Called once per frame.
    fn update(&mut self) {}

    /// Offered each event until a layer returns `true` to mark it handled.
    fn process_event(&mut self, _event: &Event) -> bool {
        false
    }
}

/// An ordered collection of owned layers.
#[derive(Default)]
pub struct LayerStack {
    layers: Vec<Box<dyn Layer>>,
    insert_index: usize,
}

impl LayerStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a layer and calls its [`Layer::on_attach`].
    ///
    /// Returns `false` without attaching if a layer with the same name is
    /// already in the stack.
    pub fn attach(&mut self, mut layer: Box<dyn Layer>) -> bool {
        if self.contains(layer.name()) {
            log::warn!("Layer '{}' has already been attached.", layer.name());
            return false;
        }

        layer.on_attach();
        if layer.is_overlay() {
            self.layers.push(layer);
        } else {
            self.layers.insert(self.insert_index, layer);
            self.insert_index += 1;
        }
        true
    }

    /// Detaches the named layer, calls its [`Layer::on_detach`] and hands it back.
    pub fn detach(&mut self, name: &str) -> Option<Box<dyn Layer>> {
        let Some(index) = self.layers.iter().position(|l| l.name() == name) else {
            log::error!("Layer '{name}' is not currently attached.");
            return None;
        };

        let mut layer = self.layers.remove(index);
        if index < self.insert_index {
            self.insert_index -= 1;
        }
        layer.on_detach();
        Some(layer)
    }

    /// Returns `true` if a layer with this name is attached.
    pub fn contains(&self, name: &str) -> bool {
        self.layers.iter().any(|l| l.name() == name)
    }

    /// The number of attached layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` if no layer is attached.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layer names in drive order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.name())
    }

    /// Runs [`Layer::fixed_update`] on every layer in order.
    pub fn fixed_update(&mut self, timestep: f32) {
        for layer in &mut self.layers {
            layer.fixed_update(timestep);
        }
    }

    /// Runs [`Layer::update`] on every layer in order.
    pub fn update(&mut self) {
        for layer in &mut self.layers {
            layer.update();
        }
    }

    /// Offers the event to each layer in reverse drive order.
    ///
    /// Returns the name of the layer that handled it, if any.
    pub fn process_event(&mut self, event: &Event) -> Option<&str> {
        let index = self
            .layers
            .iter_mut()
            .rposition(|layer| layer.process_event(event))?;
        Some(self.layers[index].name())
    }
}

impl Drop for LayerStack {
    fn drop(&mut self) {
        for layer in &mut self.layers {
            layer.on_detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        handles: fn(&Event) -> bool,
        name: &'static str,
        overlay: bool,
        events: Rc<RefCell<Vec<String>>>,
    }

    impl Layer for Recorder {
        fn name(&self) -> &str {
            self.name
        }
        fn is_overlay(&self) -> bool {
            self.overlay
        }
        fn on_attach(&mut self) {
            self.events.borrow_mut().push(format!("attach:{}", self.name));
        }
        fn on_detach(&mut self) {
            self.events.borrow_mut().push(format!("detach:{}", self.name));
        }
        fn update(&mut self) {
            self.events.borrow_mut().push(format!("update:{}", self.name));
        }
        fn process_event(&mut self, event: &Event) -> bool {
            self.events.borrow_mut().push(format!("event:{}", self.name));
            (self.handles)(event)
        }
    }

    fn recorder(
        name: &'static str,
        overlay: bool,
        events: &Rc<RefCell<Vec<String>>>,
    ) -> Box<Recorder> {
        Box::new(Recorder {
            handles: |_| false,
            name,
            overlay,
            events: events.clone(),
        })
    }

    #[test]
    fn overlays_are_driven_after_regular_layers() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut stack = LayerStack::new();
        assert!(stack.attach(recorder("hud", true, &events)));
        assert!(stack.attach(recorder("world", false, &events)));
        assert!(stack.attach(recorder("debug", true, &events)));
        assert!(stack.attach(recorder("ui", false, &events)));

        let order: Vec<_> = stack.names().collect();
        assert_eq!(order, vec!["world", "ui", "hud", "debug"]);

        events.borrow_mut().clear();
        stack.update();
        assert_eq!(
            *events.borrow(),
            vec!["update:world", "update:ui", "update:hud", "update:debug"]
        );
    }

    #[test]
    fn duplicate_attach_is_ignored() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut stack = LayerStack::new();
        assert!(stack.attach(recorder("world", false, &events)));
        assert!(!stack.attach(recorder("world", false, &events)));
        assert_eq!(stack.len(), 1);
        assert_eq!(*events.borrow(), vec!["attach:world"]);
    }

    #[test]
    fn detach_keeps_insert_position_consistent() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut stack = LayerStack::new();
        stack.attach(recorder("a", false, &events));
        stack.attach(recorder("overlay", true, &events));
        assert!(stack.detach("a").is_some());
        assert!(stack.detach("missing").is_none());
        stack.attach(recorder("b", false, &events));
        let order: Vec<_> = stack.names().collect();
        assert_eq!(order, vec!["b", "overlay"]);
    }

    #[test]
    fn drop_detaches_everything() {
        let events = Rc::new(RefCell::new(Vec::new()));
        {
            let mut stack = LayerStack::new();
            stack.attach(recorder("a", false, &events));
            stack.attach(recorder("b", true, &events));
            events.borrow_mut().clear();
        }
        assert_eq!(*events.borrow(), vec!["detach:a", "detach:b"]);
    }

    #[test]
    fn events_reach_overlays_first_and_stop_when_handled() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut stack = LayerStack::new();
        let mut world = recorder("world", false, &events);
        world.handles = |_| true;
        let mut hud = recorder("hud", true, &events);
        hud.handles = |event| matches!(event, Event::MouseButtonPressed { .. });
        stack.attach(world);
        stack.attach(hud);
        stack.attach(recorder("debug", true, &events));
        events.borrow_mut().clear();

        let handler = stack.process_event(&Event::MouseButtonPressed { button: 0 });
        assert_eq!(handler, Some("hud"));
        assert_eq!(*events.borrow(), vec!["event:debug", "event:hud"]);

        events.borrow_mut().clear();
        let handler = stack.process_event(&Event::WindowResized {
            width: 800,
            height: 600,
        });
        assert_eq!(handler, Some("world"));
        assert_eq!(
            *events.borrow(),
            vec!["event:debug", "event:hud", "event:world"]
        );
    }

    #[test]
    fn unhandled_event_visits_every_layer() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut stack = LayerStack::new();
        stack.attach(recorder("a", false, &events));
        stack.attach(recorder("b", false, &events));
        events.borrow_mut().clear();

        assert_eq!(stack.process_event(&Event::WindowClosed), None);
        assert_eq!(*events.borrow(), vec!["event:b", "event:a"]);
    }
}
