//! Declaration macro for the exported `gcguard_*` surface.

/// Declare one exported C entrypoint of the guard or registry surface.
///
/// ```ignore
/// abi_fn! {
///     /// Managed context word for `node`, or 0.
///     fn gcguard_thread_record_context(node: *const c_void) -> usize {
///         record(node).map_or(0, ThreadRecord::context)
///     }
/// }
/// ```
///
/// The function is emitted unmangled as `pub unsafe extern "C"`. The return
/// type is optional. The body is wrapped in `unsafe` and is responsible for
/// its own argument checks: every export tolerates null pointers and null
/// handles. Conditions the caller cannot recover from go through
/// `check_abi::fatal` instead of unwinding. A shared `# Safety` section is
/// appended to the caller's docs.
macro_rules! abi_fn {
    (
        $(#[$meta:meta])*
        fn $name:ident( $($arg:ident : $argty:ty),* $(,)? ) $(-> $ret:ty)?
        $body:block
    ) => {
        $(#[$meta])*
        ///
        /// # Safety
        ///
        /// Pointer arguments must be null or valid for the access described
        /// above. Record handles must come from
        /// `gcguard_register_current_thread` and must not be used after
        /// `gcguard_unregister_thread` consumed them.
        #[unsafe(no_mangle)]
        #[allow(unused_unsafe)]
        pub unsafe extern "C" fn $name( $($arg : $argty),* ) $(-> $ret)? {
            unsafe { $body }
        }
    };
}
