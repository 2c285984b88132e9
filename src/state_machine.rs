/// The [`StateMachine`] trait provides calling semantics for the pure decision
/// cores of this crate and indicates the upholding of invariants that
/// guarantee deterministic behavior.
///
/// # Functionality
/// A state machine operates on defined inputs and outputs, typically enums
/// when there are multiple variants of each. The inherent impl of the machine
/// keeps the actual logic in per-variant methods; this trait provides the
/// dispatch mapping from the unified [`Input`](StateMachine::Input) and
/// [`Output`](StateMachine::Output) types to those methods, so the machine
/// stays focused on logic rather than calling semantics.
///
/// # Invariants
/// A [`StateMachine`] must be pure: its operation may not depend on any
/// external behavior of the broader system. Implementors *must* uphold all of
/// the following.
///
/// - **No interior mutability.** Mutation only through `&mut` access; no
///   [`std::cell`] or [`std::sync`] containers, no shared smart pointers.
/// - **No IO.** No [`std::io`], [`std::net`], or libraries wrapping them.
/// - **No system time.** Reading [`std::time::Instant::now`] or
///   [`std::time::SystemTime`] makes two otherwise identical executions
///   diverge. Time values are still allowed, but must arrive as input — the
///   tick inputs in this crate carry the clock reading taken by the runner.
/// - **No system RNG, no threads, no async, no blocking.**
///
/// The impure work — timers, tasks, callback delivery — lives in the runner
/// that wraps the machine, reads the clock, and feeds the reading in as input.
/// This keeps the machine replayable in tests while the runner manages the
/// connection to the real world.
pub trait StateMachine {
    /// The type of input that is [processed](StateMachine::process_input) by
    /// the state machine.
    ///
    /// This is often an enum containing all the possible variants of input,
    /// but can also be a struct when there is only one input variant.
    type Input;
    /// The type of output that is [polled](StateMachine::poll_output) by the
    /// state machine.
    ///
    /// This is often an enum containing all the possible variants of output,
    /// but can also be a struct when there is only one output variant.
    type Output;

    /// Process the provided `input` into the state machine.
    ///
    /// The implementor of this method provides the dispatch mapping from the
    /// unified [`Input`](StateMachine::Input) type of this trait to the
    /// corresponding method of the state machine.
    fn process_input(&mut self, input: Self::Input);

    /// Poll the state machine for output, returning the first available
    /// output if present.
    ///
    /// The implementor of this trait provides the dispatch mapping from the
    /// polling methods of the state machine to the unified
    /// [`Output`](StateMachine::Output) type of this trait.
    fn poll_output(&mut self) -> Option<Self::Output>;
}
