/// Holds resources the GPU may still be reading from or writing to.
///
/// [`InFlight::settle`] hands them back once the GPU is known to be done. Dropping an unsettled
/// `InFlight` leaks them instead: releasing memory under a running copy gets the device removed,
/// a leak only costs the staging buffer.
pub(crate) struct InFlight<T> {
    resources: Option<T>,
    what: &'static str,
}

impl<T> InFlight<T> {
    pub fn new(what: &'static str, resources: T) -> Self {
        Self {
            resources: Some(resources),
            what,
        }
    }

    pub fn get(&self) -> &T {
        // only `settle` and `drop` take the resources, both consume `self`
        match &self.resources {
            Some(resources) => resources,
            None => unreachable!("in-flight resources accessed after settling"),
        }
    }

    /// Returns the resources, the GPU no longer uses them.
    pub fn settle(mut self) -> T {
        match self.resources.take() {
            Some(resources) => resources,
            None => unreachable!("in-flight resources settled twice"),
        }
    }
}

impl<T> Drop for InFlight<T> {
    fn drop(&mut self) {
        if let Some(resources) = self.resources.take() {
            log::error!(
                "leaking {} still in use by the GPU after a failed completion wait",
                self.what
            );
            std::mem::forget(resources);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;

    struct DropCounter(Rc<Cell<u32>>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn settled_resources_are_released_normally() {
        let drops = Rc::new(Cell::new(0));
        let in_flight = InFlight::new("copy", DropCounter(drops.clone()));

        let resources = in_flight.settle();
        assert_eq!(drops.get(), 0);

        drop(resources);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn unsettled_resources_are_never_released() {
        let drops = Rc::new(Cell::new(0));

        let wait: Result<(), &str> = Err("fence wait failed");
        let outcome = (|| {
            let in_flight = InFlight::new("copy", (DropCounter(drops.clone()), 7u32));
            assert_eq!(in_flight.get().1, 7);
            wait?;
            Ok::<_, &str>(in_flight.settle())
        })();

        assert!(outcome.is_err());
        assert_eq!(drops.get(), 0);
        // the leaked counter still holds its reference
        assert_eq!(Rc::strong_count(&drops), 2);
    }
}
