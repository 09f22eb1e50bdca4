//! Front/back framebuffer pair shared between the scan interrupt and the
//! drawing code.
//!
//! Two slots hold the framebuffers and an atomic index names the front one.
//! The access rules are:
//!
//! - the scan interrupt only ever reads the front slot,
//! - the drawing side only ever touches the back slot,
//! - the role index only changes inside a critical section, so the interrupt
//!   can never observe a half-finished swap or a copy in progress.
//!
//! These rules are what make the `unsafe` accessors below sound. They are
//! `pub(crate)` so only [`Engine`](crate::Engine) and
//! [`Panel`](crate::Panel) can uphold them.

use core::cell::UnsafeCell;
use core::sync::atomic::Ordering;

use portable_atomic::AtomicU8;

use crate::framebuffer::Framebuffer;

/// Two framebuffers and the index of the one currently scanned.
pub struct DoubleBuffer {
    slots: [UnsafeCell<Framebuffer>; 2],
    front: AtomicU8,
}

// SAFETY: every access to `slots` follows the front/back rules in the module
// documentation, and role changes happen inside a critical section.
unsafe impl Sync for DoubleBuffer {}

impl DoubleBuffer {
    /// Creates a pair of empty slots. Usable in `static` initializers.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [
                UnsafeCell::new(Framebuffer::empty()),
                UnsafeCell::new(Framebuffer::empty()),
            ],
            front: AtomicU8::new(0),
        }
    }

    #[inline]
    fn front_index(&self) -> usize {
        usize::from(self.front.load(Ordering::Acquire) & 1)
    }

    /// Stores freshly allocated buffers, slot 0 becoming the front.
    ///
    /// # Safety
    ///
    /// No other reference into either slot may be alive and the scan
    /// interrupt must not be able to read the front slot concurrently
    /// (call it with interrupts masked or before scanning is enabled).
    pub(crate) unsafe fn install(&self, front: Framebuffer, back: Framebuffer) {
        *self.slots[0].get() = front;
        *self.slots[1].get() = back;
        self.front.store(0, Ordering::Release);
    }

    /// Frees both buffers, leaving empty slots behind.
    ///
    /// # Safety
    ///
    /// Same requirements as [`DoubleBuffer::install`].
    pub(crate) unsafe fn release(&self) {
        *self.slots[0].get() = Framebuffer::empty();
        *self.slots[1].get() = Framebuffer::empty();
    }

    /// The buffer being scanned.
    ///
    /// # Safety
    ///
    /// The caller must not hold the reference across a [`DoubleBuffer::swap`]
    /// or [`DoubleBuffer::release`]. The scan interrupt satisfies this because
    /// both run with interrupts masked.
    #[inline]
    pub(crate) unsafe fn front(&self) -> &Framebuffer {
        &*self.slots[self.front_index()].get()
    }

    /// The buffer being drawn into.
    ///
    /// # Safety
    ///
    /// Only the single drawing owner may call this, and never while another
    /// reference to the back slot is alive.
    #[inline]
    pub(crate) unsafe fn back(&self) -> &Framebuffer {
        &*self.slots[self.front_index() ^ 1].get()
    }

    /// Mutable access to the buffer being drawn into.
    ///
    /// # Safety
    ///
    /// Only the single drawing owner may call this, and never while another
    /// reference to the back slot is alive.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn back_mut(&self) -> &mut Framebuffer {
        &mut *self.slots[self.front_index() ^ 1].get()
    }

    /// Exchanges the front and back roles with the scan interrupt masked.
    ///
    /// With `copy_front_to_back` the new front is copied into the new back
    /// before the mask is lifted, so both buffers end up bit-identical. That
    /// copy costs time proportional to the buffer size.
    ///
    /// # Safety
    ///
    /// Only the single drawing owner may call this, and no reference obtained
    /// from [`DoubleBuffer::back`] or [`DoubleBuffer::back_mut`] may be alive.
    pub(crate) unsafe fn swap(&self, copy_front_to_back: bool) {
        critical_section::with(|_cs| {
            let new_front = self.front_index() ^ 1;
            self.front.store(new_front as u8, Ordering::Release);
            if copy_front_to_back {
                let front = &*self.slots[new_front].get();
                let back = &mut *self.slots[new_front ^ 1].get();
                back.copy_from(front);
            }
        });
    }
}

impl Default for DoubleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for DoubleBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DoubleBuffer")
            .field("front", &self.front_index())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PanelGeometry;

    fn installed() -> DoubleBuffer {
        let geometry = PanelGeometry::hub08(64, 32, 1, 16);
        let db = DoubleBuffer::new();
        unsafe {
            db.install(
                Framebuffer::try_new(geometry).unwrap(),
                Framebuffer::try_new(geometry).unwrap(),
            );
        }
        db
    }

    #[test]
    fn test_new_slots_are_empty() {
        let db = DoubleBuffer::new();
        unsafe {
            assert!(db.front().as_bytes().is_empty());
            assert!(db.back().as_bytes().is_empty());
        }
    }

    #[test]
    fn test_drawing_goes_to_back_only() {
        let db = installed();
        unsafe {
            db.back_mut().set_pixel(1, 1, true);
            assert_eq!(db.back().pixel(1, 1), Some(true));
            assert_eq!(db.front().pixel(1, 1), Some(false));
        }
    }

    #[test]
    fn test_swap_without_copy_publishes_back() {
        let db = installed();
        unsafe {
            db.back_mut().set_pixel(0, 0, true);
            db.back_mut().set_pixel(63, 31, true);
            db.swap(false);
            assert_eq!(db.front().pixel(0, 0), Some(true));
            assert_eq!(db.front().pixel(63, 31), Some(true));
            assert_eq!(db.front().as_bytes().iter().filter(|&&b| b != 0).count(), 2);
            // the old front becomes the back, unsynced
            assert!(db.back().as_bytes().iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_swap_with_copy_syncs_buffers() {
        let db = installed();
        unsafe {
            db.back_mut().set_pixel(5, 7, true);
            db.swap(true);
            assert_eq!(db.front().as_bytes(), db.back().as_bytes());
            assert_eq!(db.back().pixel(5, 7), Some(true));
        }
    }

    #[test]
    fn test_double_swap_restores_roles() {
        let db = installed();
        unsafe {
            db.back_mut().set_pixel(2, 2, true);
            db.swap(false);
            db.swap(false);
            assert_eq!(db.back().pixel(2, 2), Some(true));
            assert_eq!(db.front().pixel(2, 2), Some(false));
        }
    }

    #[test]
    fn test_release_frees_storage() {
        let db = installed();
        unsafe {
            db.release();
            assert!(db.front().as_bytes().is_empty());
            assert!(db.back().as_bytes().is_empty());
        }
    }
}
