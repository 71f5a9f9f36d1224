pub mod shell;

pub use shell::ShellCommandRunner;
