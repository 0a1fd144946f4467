// -------------------------------------------------------------------
// Versioned
// -------------------------------------------------------------------

/// Value with a change counter, bumped on every write access.
#[derive(Debug, Clone, Default)]
pub struct Versioned<T> {
    version: u64,
    data: T,
}

impl<T> Versioned<T> {
    pub fn new(data: T) -> Self {
        Self { version: 0, data }
    }
    pub fn get(&self) -> &T {
        &self.data
    }
    pub fn get_mut(&mut self) -> &mut T {
        self.version = self.version.wrapping_add(1);
        &mut self.data
    }
    pub fn set(&mut self, data: T) {
        self.data = data;
        self.version = self.version.wrapping_add(1);
    }
    pub fn version(&self) -> u64 {
        self.version
    }
}

// -------------------------------------------------------------------
// Memoized
// -------------------------------------------------------------------

/// Derived value recomputed only when its key (usually a tuple of
/// [`Versioned`] counters) changes.
pub struct Memoized<S, K, V> {
    recomputations: u64,
    last_key: Option<K>,
    last_value: Option<V>,
    get_key: Box<dyn Fn(&S) -> K>,
    calc: Box<dyn Fn(&S) -> V>,
}

impl<S, K, V> Memoized<S, K, V>
where
    K: PartialEq,
{
    pub fn new(
        get_key: impl Fn(&S) -> K + 'static,
        calc: impl Fn(&S) -> V + 'static,
    ) -> Self {
        Self {
            recomputations: 0,
            last_key: None,
            last_value: None,
            get_key: Box::new(get_key),
            calc: Box::new(calc),
        }
    }

    /// Current value for `source`, recomputed if the key moved.
    pub fn get<'a>(&'a mut self, source: &S) -> &'a V {
        let key = (self.get_key)(source);
        if self.last_key.as_ref() != Some(&key) {
            self.last_value = None;
            self.last_key = Some(key);
        }
        let calc = &self.calc;
        let recomputations = &mut self.recomputations;
        self.last_value.get_or_insert_with(|| {
            *recomputations = recomputations.wrapping_add(1);
            calc(source)
        })
    }

    /// Number of times the value has been computed.
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }
}
