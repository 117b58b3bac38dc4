pub mod commands;
pub mod render;
pub mod repl;

use console::style;

use crate::notify::{ Notifier, Toast, ToastVariant };

/// Prints toasts to stderr so they stay out of piped output.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, toast: Toast) {
        let line = match toast.variant {
            ToastVariant::Default => style(format!("[!] {}", toast)).yellow(),
            ToastVariant::Destructive => style(format!("[x] {}", toast)).red(),
        };
        eprintln!("{}", line);
    }
}
