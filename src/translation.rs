use super::packet::Request;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Read,
    Write,
    Execute,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error("page fault")]
    PageFault,
    #[error("protection fault")]
    Protection,
    #[error("{0}")]
    Other(String),
}

/// Continuation of an in-flight translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationState {
    pub req: Request,
    pub mode: Mode,
    pub fault: Option<Fault>,
}

impl TranslationState {
    #[must_use]
    pub fn new(req: Request, mode: Mode) -> Self {
        Self {
            req,
            mode,
            fault: None,
        }
    }
}

/// Timing translation service.
///
/// Completed states are handed back through `Core::finish_translation`.
pub trait Translator: std::fmt::Debug {
    fn begin_translate_timing(&mut self, state: TranslationState);
}

/// Translates in request order, one completion at a time.
///
/// Successful completions use an identity mapping.
#[derive(Debug, Default)]
pub struct PendingTranslations {
    pending: VecDeque<TranslationState>,
}

impl PendingTranslations {
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Completes the oldest pending translation.
    pub fn complete_next(&mut self) -> Option<TranslationState> {
        let mut state = self.pending.pop_front()?;
        state.req.paddr = Some(state.req.vaddr);
        Some(state)
    }

    /// Completes the oldest pending translation with `fault`.
    pub fn fault_next(&mut self, fault: Fault) -> Option<TranslationState> {
        let mut state = self.pending.pop_front()?;
        state.fault = Some(fault);
        Some(state)
    }

    /// Completes all pending translations.
    pub fn complete_all(&mut self) -> Vec<TranslationState> {
        std::iter::from_fn(|| self.complete_next()).collect()
    }
}

impl Translator for PendingTranslations {
    fn begin_translate_timing(&mut self, state: TranslationState) {
        log::trace!(
            "begin translation of {:#x} ({:?}), {} pending",
            state.req.vaddr,
            state.mode,
            self.pending.len()
        );
        self.pending.push_back(state);
    }
}

#[cfg(test)]
mod tests {
    use super::{Fault, Mode, PendingTranslations, TranslationState, Translator};
    use crate::packet::Request;

    #[test]
    fn test_pending_translations_in_order() {
        let mut itb = PendingTranslations::default();
        for (uid, addr) in [(0, 0x1000), (1, 0x2000), (2, 0x3000)] {
            itb.begin_translate_timing(TranslationState::new(
                Request::inst_fetch(uid, 0, addr, 64, addr),
                Mode::Read,
            ));
        }
        assert_eq!(itb.len(), 3);

        let first = itb.complete_next().unwrap();
        assert_eq!(first.req.paddr, Some(0x1000));
        assert_eq!(first.fault, None);

        let second = itb.fault_next(Fault::PageFault).unwrap();
        assert_eq!(second.req.vaddr, 0x2000);
        assert_eq!(second.fault, Some(Fault::PageFault));

        let rest = itb.complete_all();
        assert_eq!(rest.len(), 1);
        assert!(itb.is_empty());
        assert!(itb.complete_next().is_none());
    }
}
