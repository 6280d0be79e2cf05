// Mon Feb 16 2026 - Alex

use crate::native::abi::YrScanContext;
use std::marker::PhantomData;

/// The engine's per-scan context, valid for the duration of one callback.
pub struct ScanContext<'a> {
    raw: *mut YrScanContext,
    _scan: PhantomData<&'a mut YrScanContext>,
}

impl<'a> ScanContext<'a> {
    pub(crate) fn new(raw: *mut YrScanContext) -> Self {
        Self { raw, _scan: PhantomData }
    }

    pub(crate) fn as_ptr(&self) -> *const YrScanContext {
        self.raw
    }
}

impl std::fmt::Debug for ScanContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ScanContext({:p})", self.raw)
    }
}
