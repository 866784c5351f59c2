/// Terminal host for the gridview render pipeline
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self},
};
use std::io::{self, stdout, Write};
use std::time::{Duration, Instant};
use thiserror::Error;

use gridview_core::{
    loader, CancelToken, RenderError, RenderSession, SessionConfig, SurfaceSize, TickOutcome,
};

pub mod backend;
pub mod glsl;
pub mod renderer;

pub use backend::SoftwareBackend;
pub use renderer::Framebuffer;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Pixel surface for a terminal of `columns` x `rows` cells; each cell holds two pixels stacked
pub fn surface_for(columns: u16, rows: u16) -> SurfaceSize {
    // Leave the top row for the status line
    let rows = rows.saturating_sub(1).max(1);
    SurfaceSize::new(u32::from(columns.max(1)), u32::from(rows) * 2)
}

/// Raw mode and alternate screen, undone on drop even if entering fails halfway
struct ScreenGuard<W: Write> {
    out: W,
    raw: bool,
    alternate: bool,
}

impl<W: Write> ScreenGuard<W> {
    fn enter(out: W) -> io::Result<Self> {
        let mut guard = Self {
            out,
            raw: false,
            alternate: false,
        };
        terminal::enable_raw_mode()?;
        guard.raw = true;
        execute!(guard.out, terminal::EnterAlternateScreen, cursor::Hide)?;
        guard.alternate = true;
        Ok(guard)
    }

    /// Restore the terminal, reporting the first failure
    fn leave(mut self) -> io::Result<()> {
        self.restore()
    }

    fn restore(&mut self) -> io::Result<()> {
        let mut result = Ok(());
        if std::mem::take(&mut self.raw) {
            result = terminal::disable_raw_mode();
        }
        if std::mem::take(&mut self.alternate) {
            let shown = execute!(self.out, terminal::LeaveAlternateScreen, cursor::Show);
            result = result.and(shown);
        }
        result
    }
}

impl<W: Write> Drop for ScreenGuard<W> {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::warn!(error = %e, "could not restore terminal");
        }
    }
}

/// Main application struct for terminal rendering
pub struct TerminalApp {
    config: SessionConfig,
    cancel: CancelToken,
    frame_limit: Option<u64>,
    last_frame: Instant,
    frame_count: u32,
    fps: f32,
}

impl TerminalApp {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
            frame_limit: None,
            last_frame: Instant::now(),
            frame_count: 0,
            fps: 0.0,
        }
    }

    /// Stop on its own after `frames` ticks
    pub fn with_frame_limit(mut self, frames: Option<u64>) -> Self {
        self.frame_limit = frames;
        self
    }

    /// Token that stops the render loop from outside
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Set up the pipeline, then render until cancelled or `q` is pressed.
    ///
    /// Setup failures are returned before the terminal is switched to the
    /// alternate screen, so diagnostics stay visible.
    pub fn run(&mut self) -> Result<(), AppError> {
        let (columns, rows) = terminal::size()?;
        let surface = surface_for(columns, rows);
        let mut gl = SoftwareBackend::new(surface.width, surface.height);

        let setup = RenderSession::begin(&mut gl, self.config.clone(), surface)?;
        let points = match loader::load_points_file(&self.config.data_path) {
            Ok(points) => points,
            Err(e) => {
                setup.abort(&mut gl);
                return Err(RenderError::from(e).into());
            }
        };
        let mut session = setup.attach_geometry(&mut gl, &points)?;
        tracing::debug!(columns, rows, vertices = session.vertex_count(), "terminal session ready");

        let screen = match ScreenGuard::enter(stdout()) {
            Ok(screen) => screen,
            Err(e) => {
                session.dispose(&mut gl);
                return Err(e.into());
            }
        };

        let result = self.main_loop(&mut gl, &mut session);
        session.dispose(&mut gl);
        screen.leave()?;

        result
    }

    fn main_loop(
        &mut self,
        gl: &mut SoftwareBackend,
        session: &mut RenderSession<SoftwareBackend>,
    ) -> Result<(), AppError> {
        let target_frame_time = Duration::from_millis(1000 / 30); // 30 FPS target

        loop {
            let frame_start = Instant::now();

            // Handle input
            while event::poll(Duration::from_millis(0))? {
                self.handle_event(event::read()?, gl, session);
            }

            if session.tick(gl, &self.cancel) == TickOutcome::Stop {
                break;
            }
            self.present(gl, session)?;

            if self.frame_limit.is_some_and(|limit| session.frames() >= limit) {
                self.cancel.cancel();
            }

            // Frame timing
            self.frame_count += 1;
            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                std::thread::sleep(target_frame_time - elapsed);
            }

            // Update FPS counter
            let now = Instant::now();
            if (now - self.last_frame).as_secs() >= 1 {
                self.fps = self.frame_count as f32 / (now - self.last_frame).as_secs_f32();
                self.frame_count = 0;
                self.last_frame = now;
            }
        }

        Ok(())
    }

    fn handle_event(
        &mut self,
        event: Event,
        gl: &mut SoftwareBackend,
        session: &mut RenderSession<SoftwareBackend>,
    ) {
        match event {
            Event::Key(KeyEvent {
                code: KeyCode::Char('q') | KeyCode::Esc,
                ..
            }) => self.cancel.cancel(),
            Event::Resize(columns, rows) => {
                let surface = surface_for(columns, rows);
                gl.resize(surface.width, surface.height);
                session.resize(gl, surface);
            }
            _ => {}
        }
    }

    fn present(
        &self,
        gl: &SoftwareBackend,
        session: &RenderSession<SoftwareBackend>,
    ) -> io::Result<()> {
        let mut stdout = stdout();
        // Frame goes below the status line
        gl.framebuffer().draw(&mut stdout, 1)?;

        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            terminal::Clear(terminal::ClearType::CurrentLine),
            SetForegroundColor(Color::Yellow),
            Print(format!(
                "gridview | FPS: {:.1} | vertices: {} | {:?}/{:?} | Q=Quit",
                self.fps,
                session.vertex_count(),
                self.config.geometry,
                self.config.primitive,
            )),
            ResetColor
        )?;

        stdout.flush()
    }
}
