//! The Fibonacci computer.

/// Compute the `n`-th Fibonacci number by naive double recursion.
///
/// `fibonacci(0) == 0`, `fibonacci(1) == 1` and every `n <= 1` is returned
/// unchanged, so negative inputs come back as themselves. The recursion is
/// deliberately unmemoized: the exponential running time is the workload.
///
/// # Preconditions
///
/// - Stack depth grows linearly with `n`. Stack space is not checked; a large
///   enough `n` exhausts it and the fault is fatal.
/// - The sum wraps on `i32` overflow (two's complement, same in debug and
///   release). `fibonacci(46)` is the largest exact value; from `47` on the
///   result is wrapped.
#[allow(unsafe_code)]
#[unsafe(no_mangle)]
pub extern "C" fn fibonacci(n: i32) -> i32 {
    if n <= 1 {
        return n;
    }
    fibonacci(n - 1).wrapping_add(fibonacci(n - 2))
}
