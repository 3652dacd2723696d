// AArch64 architecture-specific code: exception handling, syscall entry,
// the generic timer, PSCI companion-core bring-up, and the panic console.

pub mod console;
pub mod irq;
pub mod psci;
pub mod timer;
pub mod trap;

pub use trap::TrapFrame;
