//! Scripted platform and storage doubles for unit tests

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use crate::error::{PlatformError, StorageError, StorageResult};
use crate::platform::{
    ChangeFlags, ChangeNotifier, ConfigureOption, DisplayConfigurator, DisplayQuery,
    PlatformResult, ReconfigurationCallback,
};
use crate::storage::{KeyValueStore, StringListMap};
use crate::types::{DisplayId, Mode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigEvent {
    Begin,
    Configure(DisplayId, u32),
    Cancel,
    Complete(ConfigureOption),
}

#[derive(Default)]
pub struct FakeTransaction {
    staged: Vec<(DisplayId, Mode)>,
}

/// In-memory display server
#[derive(Default)]
pub struct FakePlatform {
    displays: RefCell<BTreeMap<DisplayId, Vec<Mode>>>,
    current: RefCell<BTreeMap<DisplayId, Mode>>,
    events: RefCell<Vec<ConfigEvent>>,
    registrations: RefCell<Vec<(ReconfigurationCallback, u64)>>,
    unregister_calls: Cell<usize>,
    fail_list: bool,
    fail_modes: Vec<DisplayId>,
    fail_begin: bool,
    fail_configure: bool,
    fail_complete: bool,
    fail_register: bool,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_display(self, id: u32, modes: Vec<Mode>) -> Self {
        self.displays.borrow_mut().insert(DisplayId(id), modes);
        self
    }

    pub fn with_current(self, id: u32, mode: Mode) -> Self {
        self.current.borrow_mut().insert(DisplayId(id), mode);
        self
    }

    pub fn failing_display_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn failing_modes_for(mut self, id: u32) -> Self {
        self.fail_modes.push(DisplayId(id));
        self
    }

    pub fn failing_begin(mut self) -> Self {
        self.fail_begin = true;
        self
    }

    pub fn failing_configure(mut self) -> Self {
        self.fail_configure = true;
        self
    }

    pub fn failing_complete(mut self) -> Self {
        self.fail_complete = true;
        self
    }

    pub fn failing_register(mut self) -> Self {
        self.fail_register = true;
        self
    }

    pub fn remove_display(&self, id: u32) {
        self.displays.borrow_mut().remove(&DisplayId(id));
        self.current.borrow_mut().remove(&DisplayId(id));
    }

    pub fn current(&self, id: u32) -> Option<Mode> {
        self.current.borrow().get(&DisplayId(id)).copied()
    }

    pub fn config_events(&self) -> Vec<ConfigEvent> {
        self.events.borrow().clone()
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.borrow().len()
    }

    pub fn unregister_calls(&self) -> usize {
        self.unregister_calls.get()
    }

    /// Deliver a notification from a foreign thread, returning once delivered
    pub fn emit(&self, display: DisplayId, flags: ChangeFlags) {
        let registrations = self.registrations.borrow().clone();
        for (callback, context) in registrations {
            std::thread::spawn(move || callback(display, flags, context))
                .join()
                .expect("notification thread panicked");
        }
    }
}

impl DisplayQuery for FakePlatform {
    fn online_displays(&self) -> PlatformResult<Vec<DisplayId>> {
        if self.fail_list {
            return Err(PlatformError::Query("display list unavailable".to_string()));
        }
        Ok(self.displays.borrow().keys().copied().collect())
    }

    fn all_modes(&self, display: DisplayId) -> PlatformResult<Vec<Mode>> {
        if self.fail_modes.contains(&display) {
            return Err(PlatformError::Query("modes unavailable".to_string()));
        }
        self.displays
            .borrow()
            .get(&display)
            .cloned()
            .ok_or(PlatformError::UnknownDisplay(display))
    }

    fn current_mode(&self, display: DisplayId) -> PlatformResult<Option<Mode>> {
        if !self.displays.borrow().contains_key(&display) {
            return Err(PlatformError::UnknownDisplay(display));
        }
        Ok(self.current.borrow().get(&display).copied())
    }
}

impl DisplayConfigurator for FakePlatform {
    type Transaction = FakeTransaction;

    fn begin(&self) -> PlatformResult<FakeTransaction> {
        if self.fail_begin {
            return Err(PlatformError::Rejected("server busy".to_string()));
        }
        self.events.borrow_mut().push(ConfigEvent::Begin);
        Ok(FakeTransaction::default())
    }

    fn configure(
        &self,
        txn: &mut FakeTransaction,
        display: DisplayId,
        mode: &Mode,
    ) -> PlatformResult<()> {
        self.events
            .borrow_mut()
            .push(ConfigEvent::Configure(display, mode.native_mode_id));
        if self.fail_configure {
            return Err(PlatformError::Rejected("mode refused".to_string()));
        }
        if !self.displays.borrow().contains_key(&display) {
            return Err(PlatformError::UnknownDisplay(display));
        }
        txn.staged.push((display, *mode));
        Ok(())
    }

    fn cancel(&self, _txn: FakeTransaction) {
        self.events.borrow_mut().push(ConfigEvent::Cancel);
    }

    fn complete(&self, txn: FakeTransaction, option: ConfigureOption) -> PlatformResult<()> {
        self.events.borrow_mut().push(ConfigEvent::Complete(option));
        if self.fail_complete {
            return Err(PlatformError::Rejected("commit failed".to_string()));
        }
        let mut current = self.current.borrow_mut();
        for (display, mode) in txn.staged {
            current.insert(display, mode);
        }
        Ok(())
    }
}

impl ChangeNotifier for &FakePlatform {
    fn register(&mut self, callback: ReconfigurationCallback, context: u64) -> PlatformResult<()> {
        if self.fail_register {
            return Err(PlatformError::Connection("no display server".to_string()));
        }
        self.registrations.borrow_mut().push((callback, context));
        Ok(())
    }

    fn unregister(&mut self, _callback: ReconfigurationCallback, context: u64) {
        self.unregister_calls.set(self.unregister_calls.get() + 1);
        self.registrations
            .borrow_mut()
            .retain(|(_, registered)| *registered != context);
    }
}

/// Storage whose every operation fails
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> StorageResult<Option<StringListMap>> {
        Err(StorageError::Io(std::io::Error::other("disk unavailable")))
    }

    fn set(&mut self, _key: &str, _value: &StringListMap) -> StorageResult<()> {
        Err(StorageError::Io(std::io::Error::other("disk unavailable")))
    }
}
