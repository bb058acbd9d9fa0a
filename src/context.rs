use crate::trait_map::TraitMap;
use crate::Day;
use std::any::Any;

/// A type that can live in a [`Context`] as a data container. The container is created with
/// `new` the first time it is requested.
pub trait DataPlugin: Any + 'static {
    /// A constant reference to a constructor
    #[allow(non_upper_case_globals)]
    const new: &'static dyn Fn() -> Self;
}

impl<T: 'static> DataPlugin for Vec<T> {
    const new: &'static dyn Fn() -> Self = &Vec::<T>::new;
}

/// Holds the simulation state: one data container per plugin type plus the current day.
pub struct Context {
    data_plugins: TraitMap,
    current_day: Day,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Context {
            data_plugins: TraitMap::new(),
            current_day: 0,
        }
    }

    /// Returns a mutable reference for the data container for `T`, creating it if it doesn't
    /// exist yet.
    pub fn get_data_container_mut<T: DataPlugin>(&mut self) -> &mut T {
        self.data_plugins
            .get_or_insert_with(|| <T as DataPlugin>::new())
    }

    /// Returns a reference to the data container for `T` if it exists.
    /// If you need a mutable reference or lazy instantiation, use
    /// `Context::get_data_container_mut()`.
    pub fn get_data_container<T: DataPlugin>(&self) -> Option<&T> {
        self.data_plugins.get::<T>()
    }

    /// Detaches the data container for `T` while `f` runs so that it can be used alongside
    /// other containers of the same context. The container is reattached afterwards.
    pub fn with_data_container<T: DataPlugin, R>(
        &mut self,
        f: impl FnOnce(&mut Context, &mut T) -> R,
    ) -> R {
        let mut container = self
            .data_plugins
            .remove::<T>()
            .map_or_else(|| <T as DataPlugin>::new(), |boxed| *boxed);
        let result = f(self, &mut container);
        self.data_plugins.insert(container);
        result
    }

    pub fn current_day(&self) -> Day {
        self.current_day
    }

    pub fn set_current_day(&mut self, day: Day) {
        self.current_day = day;
    }
}
