//! P2A bridge window
//!
//! From the host, AST internal registers are reached through BAR1 of the
//! AST VGA function (1a03:2000): writing a 64 KiB-aligned AST address to
//! the page-select register at 0xf004 and committing it at 0xf000 makes
//! that page appear at BAR1 + 0x10000.
//!
//! Every [`BridgeRegion`] multiplexes onto the one [`BridgeWindow`], so
//! page selection and the data access that follows happen under a single
//! lock. After each store a read of BAR1 + 0x3cc forces the posted write
//! to complete before the next access.

use std::sync::{Arc, Mutex, PoisonError};

use astctl_core::region::{check_bounds, Region};

/// PCI vendor id of the AST VGA function
pub const P2A_VENDOR_ID: u16 = 0x1a03;
/// PCI device id of the AST VGA function
pub const P2A_DEVICE_ID: u16 = 0x2000;
/// Bytes of BAR1 mapped for the bridge
pub const BAR1_LEN: u64 = 0x20000;

/// Page commit register
const PAGE_COMMIT: u64 = 0xf000;
/// Page select register
const PAGE_SELECT: u64 = 0xf004;
/// Start of the 64 KiB data aperture
const DATA_WINDOW: u64 = 0x10000;
/// Read-back register flushing posted writes
const FLUSH: u64 = 0x3cc;
/// AST address bits selecting the page
const PAGE_MASK: u32 = 0xffff_0000;

/// Shared BAR1 aperture and its page-select state
pub struct BridgeWindow {
    bar: Box<dyn Region>,
    /// Page currently selected, `None` until the first access
    page: Mutex<Option<u32>>,
    dry_run: bool,
}

impl BridgeWindow {
    /// Wrap a mapping of BAR1
    pub fn new(bar: Box<dyn Region>, dry_run: bool) -> Arc<Self> {
        Arc::new(Self {
            bar,
            page: Mutex::new(None),
            dry_run,
        })
    }

    /// Create a region covering `len` bytes of AST address space at `base`
    pub fn region(self: &Arc<Self>, name: &str, base: u64, len: u64) -> BridgeRegion {
        BridgeRegion {
            window: Arc::clone(self),
            name: name.into(),
            base,
            len,
        }
    }

    /// Run `access` with the page of `addr` selected, returning its result
    ///
    /// The lock is held across page selection and `access`.
    fn with_page<T>(&self, addr: u32, access: impl FnOnce(&dyn Region, u64) -> T) -> T {
        let mut current = self.page.lock().unwrap_or_else(PoisonError::into_inner);
        let page = addr & PAGE_MASK;
        if *current != Some(page) {
            self.bar.write32(PAGE_SELECT, page);
            self.bar.write32(PAGE_COMMIT, 1);
            *current = Some(page);
        }
        access(self.bar.as_ref(), DATA_WINDOW + u64::from(addr & !PAGE_MASK))
    }

    fn store(&self, addr: u32, store: impl FnOnce(&dyn Region, u64)) {
        self.with_page(addr, |bar, off| {
            if self.dry_run {
                log::trace!("ast[{:#010x}] store suppressed (no-write)", addr);
            } else {
                store(bar, off);
            }
            let _ = bar.read32(FLUSH);
        });
    }
}

/// Window of AST address space reached through the bridge
pub struct BridgeRegion {
    window: Arc<BridgeWindow>,
    name: String,
    base: u64,
    len: u64,
}

impl BridgeRegion {
    fn addr(&self, offset: u64) -> u32 {
        (self.base + offset) as u32
    }
}

impl Region for BridgeRegion {
    fn name(&self) -> &str {
        &self.name
    }

    fn base(&self) -> u64 {
        self.base
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn read8(&self, offset: u64) -> u8 {
        check_bounds(&self.name, offset, 1, self.len);
        let addr = self.addr(offset);
        let v = self.window.with_page(addr, |bar, off| bar.read8(off));
        log::trace!("ast[{:#010x}] -> {:#04x}", addr, v);
        v
    }

    fn read32(&self, offset: u64) -> u32 {
        check_bounds(&self.name, offset, 4, self.len);
        let addr = self.addr(offset);
        let v = self.window.with_page(addr, |bar, off| bar.read32(off));
        log::trace!("ast[{:#010x}] -> {:#010x}", addr, v);
        v
    }

    fn write8(&self, offset: u64, value: u8) {
        check_bounds(&self.name, offset, 1, self.len);
        let addr = self.addr(offset);
        log::trace!("ast[{:#010x}].8 := {:#04x}", addr, value);
        self.window.store(addr, |bar, off| bar.write8(off, value));
    }

    fn write32(&self, offset: u64, value: u32) {
        check_bounds(&self.name, offset, 4, self.len);
        let addr = self.addr(offset);
        log::trace!("ast[{:#010x}] := {:#010x}", addr, value);
        self.window.store(addr, |bar, off| bar.write32(off, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::thread;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum BarOp {
        Select(u32),
        Commit,
        Read { page: u32, off: u64 },
        Write { page: u32, off: u64, value: u32 },
        Flush,
    }

    /// BAR1 model: page register plus a sparse word-addressed AST memory
    #[derive(Default)]
    struct BarState {
        pending: u32,
        page: u32,
        mem: HashMap<u32, u32>,
        log: Vec<BarOp>,
    }

    #[derive(Clone, Default)]
    struct FakeBar(Arc<Mutex<BarState>>);

    impl FakeBar {
        fn ops(&self) -> Vec<BarOp> {
            self.0.lock().unwrap().log.clone()
        }

        fn word(&self, addr: u32) -> u32 {
            self.0.lock().unwrap().mem.get(&addr).copied().unwrap_or(0)
        }
    }

    impl Region for FakeBar {
        fn name(&self) -> &str {
            "bar1"
        }

        fn base(&self) -> u64 {
            0xf600_0000
        }

        fn len(&self) -> u64 {
            BAR1_LEN
        }

        fn read8(&self, offset: u64) -> u8 {
            let word = self.read32(offset & !3);
            (word >> ((offset & 3) * 8)) as u8
        }

        fn read32(&self, offset: u64) -> u32 {
            let mut s = self.0.lock().unwrap();
            if offset == FLUSH {
                s.log.push(BarOp::Flush);
                return 0;
            }
            assert!(offset >= DATA_WINDOW, "unexpected read at {:#x}", offset);
            let page = s.page;
            s.log.push(BarOp::Read { page, off: offset });
            let addr = page | (offset - DATA_WINDOW) as u32;
            s.mem.get(&addr).copied().unwrap_or(0)
        }

        fn write8(&self, offset: u64, value: u8) {
            let shift = (offset & 3) * 8;
            let word = {
                let s = self.0.lock().unwrap();
                let addr = s.page | ((offset & !3) - DATA_WINDOW) as u32;
                s.mem.get(&addr).copied().unwrap_or(0)
            };
            let word = (word & !(0xff << shift)) | (u32::from(value) << shift);
            self.write32(offset & !3, word);
        }

        fn write32(&self, offset: u64, value: u32) {
            let mut s = self.0.lock().unwrap();
            match offset {
                PAGE_SELECT => {
                    s.pending = value;
                    s.log.push(BarOp::Select(value));
                }
                PAGE_COMMIT => {
                    s.page = s.pending;
                    s.log.push(BarOp::Commit);
                }
                off if off >= DATA_WINDOW => {
                    let page = s.page;
                    s.log.push(BarOp::Write { page, off, value });
                    let addr = page | (off - DATA_WINDOW) as u32;
                    s.mem.insert(addr, value);
                }
                off => panic!("unexpected write at {:#x}", off),
            }
        }
    }

    #[test]
    fn test_page_selected_once_per_page() {
        let bar = FakeBar::default();
        let window = BridgeWindow::new(Box::new(bar.clone()), false);
        let scu = window.region("scu", 0x1e6e_2000, 0x1000);

        scu.write32(0, 0x1688_a8a8);
        assert_eq!(scu.read32(0), 0x1688_a8a8);

        assert_eq!(
            bar.ops(),
            [
                BarOp::Select(0x1e6e_0000),
                BarOp::Commit,
                BarOp::Write {
                    page: 0x1e6e_0000,
                    off: 0x12000,
                    value: 0x1688_a8a8
                },
                BarOp::Flush,
                BarOp::Read {
                    page: 0x1e6e_0000,
                    off: 0x12000
                },
            ]
        );
    }

    #[test]
    fn test_page_follows_regions() {
        let bar = FakeBar::default();
        let window = BridgeWindow::new(Box::new(bar.clone()), false);
        let scu = window.region("scu", 0x1e6e_2000, 0x1000);
        let wdt = window.region("wdt", 0x1e78_5000, 0x1000);
        let mem = window.region("fmc-mem", 0x2000_0000, 0x400_0000);

        scu.read32(0x7c);
        wdt.write32(0x2c, 0);
        mem.read32(0x1_0004);
        scu.read32(0x70);
        mem.write8(0, 0x9f);

        // Every data access sees the page of the address it targets
        for op in bar.ops() {
            match op {
                BarOp::Read { page, off } | BarOp::Write { page, off, .. } => {
                    let lo = (off - DATA_WINDOW) as u32;
                    assert!(
                        [0x1e6e_207c, 0x1e78_502c, 0x2001_0004, 0x1e6e_2070, 0x2000_0000]
                            .contains(&(page | lo)),
                        "access {:#x} with page {:#x}",
                        lo,
                        page
                    );
                }
                _ => {}
            }
        }
        assert_eq!(bar.word(0x1e78_502c), 0);
        assert_eq!(bar.word(0x2000_0000), 0x9f);
    }

    #[test]
    fn test_dry_run_keeps_page_select_and_flush() {
        let bar = FakeBar::default();
        let window = BridgeWindow::new(Box::new(bar.clone()), true);
        let wdt = window.region("wdt", 0x1e78_5000, 0x1000);

        wdt.write32(0xc, 0x33);
        assert_eq!(
            bar.ops(),
            [BarOp::Select(0x1e78_0000), BarOp::Commit, BarOp::Flush]
        );
        assert_eq!(bar.word(0x1e78_500c), 0);
    }

    #[test]
    fn test_concurrent_regions_never_see_stale_page() {
        let bar = FakeBar::default();
        let window = BridgeWindow::new(Box::new(bar.clone()), false);
        let bases = [0x1e6e_2000u64, 0x1e78_5000, 0x2000_0000, 0x8000_0000];

        let handles: Vec<_> = bases
            .iter()
            .enumerate()
            .map(|(t, &base)| {
                let region = window.region("r", base, 0x1000);
                thread::spawn(move || {
                    for i in 0..300u32 {
                        let off = u64::from(i * 4 % 0x1000);
                        let value = (t as u32) << 24 | i;
                        region.write32(off, value);
                        assert_eq!(region.read32(off), value);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        for (t, &base) in bases.iter().enumerate() {
            assert_eq!(bar.word(base as u32 + 4), (t as u32) << 24 | 1);
        }
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_bounds_checked_before_bridge_access() {
        let window = BridgeWindow::new(Box::new(FakeBar::default()), false);
        let lpc = window.region("lpc", 0x1e78_9000, 0x1000);
        lpc.read32(0x1000);
    }
}
