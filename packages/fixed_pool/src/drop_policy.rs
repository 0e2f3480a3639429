/// Determines what happens when a pool is dropped while some of its slots are still handed out.
///
/// The pool never drops the elements stored in its slots, because it does not know which
/// handed-out slots have actually been initialized. Whoever obtained a slot is responsible
/// for the element in it. By default, dropping a pool simply releases its memory.
///
/// # Examples
///
/// ```
/// use fixed_pool::{DropPolicy, FixedPool};
///
/// // The drop policy is set at pool creation time.
/// let pool = FixedPool::<u32, 16>::builder()
///     .drop_policy(DropPolicy::MustNotLeakItems)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum DropPolicy {
    /// The pool releases its memory when dropped, regardless of any slots still handed out.
    /// This is the default.
    #[default]
    MayLeakItems,

    /// The pool will panic if any of its slots are still handed out when it is dropped.
    ///
    /// This may be valuable for container code that is expected to return every slot to the
    /// pool before the pool goes away, to detect leaks early.
    MustNotLeakItems,
}
