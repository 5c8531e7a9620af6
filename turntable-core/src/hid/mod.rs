//! HID output sink: edge-triggered buttons and the registry that can release
//! every one of them at once.
//!
//! A [`HidButton`] only talks to the transport when its pressed state actually
//! changes, so callers can feed it the raw controller level every tick without
//! spamming the host. All live buttons sit in a [`HidRegistry`] owned by the
//! application root; [`HidRegistry::release_all`] is the fail-safe used when
//! the controller link drops.

pub mod report;

use core::fmt;

use heapless::Vec;

/// The host-facing side of the adapter.
pub trait HidTransport {
    fn press_key(&mut self, usage: u8);
    fn release_key(&mut self, usage: u8);
    fn press_mouse_button(&mut self, mask: u8);
    fn release_mouse_button(&mut self, mask: u8);
}

/// What a [`HidButton`] emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidOutput {
    /// Keyboard usage ID (page 0x07). Modifier usages 0xE0..=0xE7 included.
    Key(u8),
    /// Mouse button bit, see [`report::mouse`].
    MouseButton(u8),
}

/// One host button with edge detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HidButton {
    output: HidOutput,
    pressed: bool,
}

impl HidButton {
    #[must_use]
    pub const fn new(output: HidOutput) -> Self {
        Self {
            output,
            pressed: false,
        }
    }

    /// Moves to `state`, sending a press or release only on change.
    /// Returns whether anything was sent.
    pub fn press<T: HidTransport + ?Sized>(&mut self, state: bool, transport: &mut T) -> bool {
        if state == self.pressed {
            return false;
        }

        self.pressed = state;
        match (self.output, state) {
            (HidOutput::Key(usage), true) => transport.press_key(usage),
            (HidOutput::Key(usage), false) => transport.release_key(usage),
            (HidOutput::MouseButton(mask), true) => transport.press_mouse_button(mask),
            (HidOutput::MouseButton(mask), false) => transport.release_mouse_button(mask),
        }
        true
    }

    pub fn release<T: HidTransport + ?Sized>(&mut self, transport: &mut T) -> bool {
        self.press(false, transport)
    }

    #[must_use]
    pub const fn is_pressed(&self) -> bool {
        self.pressed
    }

    #[must_use]
    pub const fn output(&self) -> HidOutput {
        self.output
    }
}

/// Stable handle for a registered button.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonId(u16);

impl ButtonId {
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    /// Every slot is taken.
    Full,
    /// The handle does not name a live button.
    UnknownButton(ButtonId),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Full => f.write_str("HID registry is full"),
            RegistryError::UnknownButton(id) => write!(f, "unknown HID button #{}", id.0),
        }
    }
}

/// Fixed-capacity table of live buttons, kept in creation order.
///
/// Buttons can be removed from any position; the remaining entries keep their
/// relative order and every live button is visited exactly once by
/// [`release_all`](Self::release_all).
#[derive(Debug)]
pub struct HidRegistry<const N: usize> {
    entries: Vec<(ButtonId, HidButton), N>,
    next_id: u16,
}

impl<const N: usize> HidRegistry<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    /// Adds a released button emitting `output`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Full`] when all `N` slots are in use.
    pub fn register(&mut self, output: HidOutput) -> Result<ButtonId, RegistryError> {
        let id = ButtonId(self.next_id);
        self.entries
            .push((id, HidButton::new(output)))
            .map_err(|_| RegistryError::Full)?;
        self.next_id = self.next_id.wrapping_add(1);
        Ok(id)
    }

    /// Removes a button wherever it sits and hands it back. A removed button
    /// that was still pressed is not released; do that first if it matters.
    pub fn deregister(&mut self, id: ButtonId) -> Option<HidButton> {
        let index = self.position(id)?;
        Some(self.entries.remove(index).1)
    }

    /// Forwards a level to one button.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownButton`] when `id` is not registered.
    pub fn press<T: HidTransport + ?Sized>(
        &mut self,
        id: ButtonId,
        state: bool,
        transport: &mut T,
    ) -> Result<bool, RegistryError> {
        let button = self.get_mut(id).ok_or(RegistryError::UnknownButton(id))?;
        Ok(button.press(state, transport))
    }

    /// # Errors
    ///
    /// [`RegistryError::UnknownButton`] when `id` is not registered.
    pub fn release<T: HidTransport + ?Sized>(
        &mut self,
        id: ButtonId,
        transport: &mut T,
    ) -> Result<bool, RegistryError> {
        self.press(id, false, transport)
    }

    /// Releases every live button in creation order; returns how many
    /// releases were actually sent.
    pub fn release_all<T: HidTransport + ?Sized>(&mut self, transport: &mut T) -> usize {
        let mut sent = 0;
        for (_, button) in self.entries.iter_mut() {
            if button.release(transport) {
                sent += 1;
            }
        }
        if sent > 0 {
            debug!("hid: released {} held buttons", sent);
        }
        sent
    }

    #[must_use]
    pub fn get(&self, id: ButtonId) -> Option<&HidButton> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == id)
            .map(|(_, button)| button)
    }

    pub fn get_mut(&mut self, id: ButtonId) -> Option<&mut HidButton> {
        self.entries
            .iter_mut()
            .find(|(entry, _)| *entry == id)
            .map(|(_, button)| button)
    }

    /// Live buttons in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (ButtonId, &HidButton)> {
        self.entries.iter().map(|(id, button)| (*id, button))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, id: ButtonId) -> Option<usize> {
        self.entries.iter().position(|(entry, _)| *entry == id)
    }
}

impl<const N: usize> Default for HidRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Sent {
        KeyDown(u8),
        KeyUp(u8),
        MouseDown(u8),
        MouseUp(u8),
    }

    #[derive(Default)]
    struct Recorder {
        sent: Vec<Sent, 16>,
    }

    impl HidTransport for Recorder {
        fn press_key(&mut self, usage: u8) {
            self.sent.push(Sent::KeyDown(usage)).expect("recorder full");
        }
        fn release_key(&mut self, usage: u8) {
            self.sent.push(Sent::KeyUp(usage)).expect("recorder full");
        }
        fn press_mouse_button(&mut self, mask: u8) {
            self.sent.push(Sent::MouseDown(mask)).expect("recorder full");
        }
        fn release_mouse_button(&mut self, mask: u8) {
            self.sent.push(Sent::MouseUp(mask)).expect("recorder full");
        }
    }

    #[test]
    fn repeated_press_sends_once() {
        let mut transport = Recorder::default();
        let mut button = HidButton::new(HidOutput::Key(0x04));
        assert!(button.press(true, &mut transport));
        assert!(!button.press(true, &mut transport));
        assert!(!button.press(true, &mut transport));
        assert!(button.release(&mut transport));
        assert!(!button.release(&mut transport));
        assert_eq!(
            transport.sent.as_slice(),
            &[Sent::KeyDown(0x04), Sent::KeyUp(0x04)]
        );
    }

    #[test]
    fn release_all_after_middle_removal_visits_survivors_once() {
        let mut transport = Recorder::default();
        let mut registry: HidRegistry<4> = HidRegistry::new();
        let first = registry.register(HidOutput::Key(0x04)).expect("slot");
        let middle = registry.register(HidOutput::Key(0x05)).expect("slot");
        let last = registry.register(HidOutput::MouseButton(0x01)).expect("slot");

        for id in [first, middle, last] {
            registry.press(id, true, &mut transport).expect("registered");
        }
        transport.sent.clear();

        let removed = registry.deregister(middle).expect("middle registered");
        assert!(removed.is_pressed());

        assert_eq!(registry.release_all(&mut transport), 2);
        assert_eq!(
            transport.sent.as_slice(),
            &[Sent::KeyUp(0x04), Sent::MouseUp(0x01)]
        );
        assert_eq!(registry.release_all(&mut transport), 0);
    }

    #[test]
    fn head_tail_and_sole_removal() {
        let mut registry: HidRegistry<3> = HidRegistry::new();
        let a = registry.register(HidOutput::Key(1)).expect("slot");
        let b = registry.register(HidOutput::Key(2)).expect("slot");
        let c = registry.register(HidOutput::Key(3)).expect("slot");

        assert!(registry.deregister(a).is_some());
        assert!(registry.deregister(c).is_some());
        let order: Vec<ButtonId, 3> = registry.iter().map(|(id, _)| id).collect();
        assert_eq!(order.as_slice(), &[b]);

        assert!(registry.deregister(b).is_some());
        assert!(registry.is_empty());
        assert!(registry.deregister(b).is_none());
    }

    #[test]
    fn registry_reports_full_and_unknown() {
        let mut transport = Recorder::default();
        let mut registry: HidRegistry<1> = HidRegistry::new();
        let only = registry.register(HidOutput::Key(9)).expect("slot");
        assert_eq!(
            registry.register(HidOutput::Key(10)),
            Err(RegistryError::Full)
        );
        registry.deregister(only);
        assert_eq!(
            registry.press(only, true, &mut transport),
            Err(RegistryError::UnknownButton(only))
        );
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut registry: HidRegistry<2> = HidRegistry::new();
        let a = registry.register(HidOutput::Key(1)).expect("slot");
        registry.deregister(a);
        let b = registry.register(HidOutput::Key(1)).expect("slot");
        assert_ne!(a, b);
    }
}
