use std::fmt;

/// Compares two argument tuples.
pub type Equality<A> = Box<dyn Fn(&A, &A) -> bool + Send + Sync>;

/// The default [`Equality`], which defers to [`PartialEq`].
pub fn default_equality<A: PartialEq + 'static>() -> Equality<A> {
    Box::new(|a: &A, b: &A| a == b)
}

/// A memoizer that remembers exactly one invocation.
///
/// [`get_or_call`](Self::get_or_call) returns the remembered result if the arguments are equal to
/// the remembered ones, and otherwise replaces the slot with a fresh invocation.
pub struct MemoizeOne<A, R> {
    equality: Equality<A>,
    last: Option<(A, R)>,
}

impl<A: PartialEq + 'static, R> MemoizeOne<A, R> {
    /// Creates an empty memoizer comparing arguments with [`PartialEq`].
    pub fn new() -> Self {
        Self::with_equality(default_equality())
    }
}

impl<A: PartialEq + 'static, R> Default for MemoizeOne<A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, R> MemoizeOne<A, R> {
    /// Creates an empty memoizer comparing arguments with the given function.
    pub fn with_equality(equality: Equality<A>) -> Self {
        Self {
            equality,
            last: None,
        }
    }

    /// Returns `true` if `args` would hit the remembered invocation.
    pub fn matches(&self, args: &A) -> bool {
        self.last
            .as_ref()
            .is_some_and(|(last_args, _)| (self.equality)(last_args, args))
    }

    /// Returns the remembered result for `args`, or calls `f` and remembers its result.
    pub fn get_or_call<F>(&mut self, args: A, f: F) -> &R
    where
        F: FnOnce(&A) -> R,
    {
        if !self.matches(&args) {
            let result = f(&args);
            return &self.last.insert((args, result)).1;
        }

        let (_, result) = self
            .last
            .as_ref()
            .expect("infallible: a matching slot is populated");
        result
    }

    /// Forgets the remembered invocation.
    pub fn clear(&mut self) {
        self.last = None;
    }
}

impl<A, R> fmt::Debug for MemoizeOne<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoizeOne")
            .field("occupied", &self.last.is_some())
            .finish()
    }
}
