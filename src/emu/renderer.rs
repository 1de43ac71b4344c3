use super::DisplayBuffer;

/// Presentation capability supplied by the host.
///
/// Both methods are called synchronously from the execution thread, so they
/// must return promptly; a slow renderer stretches every tick. A returned
/// error ends the current run.
pub trait Renderer: Send {
    /// Called after every clear and sprite draw with the full frame.
    fn render(&mut self, display: &DisplayBuffer) -> anyhow::Result<()>;

    /// Called on every step that starts with a non-zero sound timer.
    fn beep(&mut self) -> anyhow::Result<()>;
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, display: &DisplayBuffer) -> anyhow::Result<()> {
        (**self).render(display)
    }

    fn beep(&mut self) -> anyhow::Result<()> {
        (**self).beep()
    }
}

/// Discards frames and beeps. Useful for headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&mut self, _display: &DisplayBuffer) -> anyhow::Result<()> {
        Ok(())
    }

    fn beep(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
