use std::fmt::{Display, Formatter};

use std::io::Write;
use std::time::Instant;

use std::sync::mpsc::{channel, Sender};
use std::thread::ThreadId;
#[cfg(feature = "buffered_out")]
use std::io::BufWriter;

use console::{pad_str, pad_str_with, style, Alignment};

use crate::engine::StopFlags;

/// Struct to hold the UI
/// Particulary the receiver channel
pub struct UI {
    sender: UISender,
}

#[derive(Clone)]
pub struct UISender {
    sender: Sender<UIMessage>,
}

impl UISender {
    /// Send typed UIMessage to internal channel.
    /// Messages sent after the printer exited are dropped.
    pub fn send(&self, user_msg: UIUserMessage) {
        #[cfg(not(feature = "disable_ui"))]
        let _ = self.sender.send(UIMessage {
            thread_id: std::thread::current().id(),
            message: user_msg,
        });
    }
}

impl Default for UI {
    fn default() -> Self {
        UI::new()
    }
}

impl UI {
    pub fn get_sender(&self) -> UISender {
        self.sender.clone()
    }

    pub fn new() -> Self {
        let (sender, receiver) = channel::<UIMessage>();

        #[cfg(not(feature = "disable_ui"))]
        std::thread::spawn(move || {
            #[cfg(not(feature = "locked_out"))]
            let stdout = std::io::stdout();
            #[cfg(feature = "locked_out")]
            let stdout = std::io::stdout().lock();

            #[cfg(not(feature = "buffered_out"))]
            let mut buffered_out = stdout;
            #[cfg(feature = "buffered_out")]
            let mut buffered_out = BufWriter::with_capacity(512, stdout);

            let start_time = Instant::now();

            let mut total_pricing_runtime = 0.0;
            let mut total_lp_runtime = 0.0;
            let mut num_iterations = 0usize;
            let mut num_pricing_failures = 0usize;

            while let Ok(UIMessage { thread_id, message }) = receiver.recv() {
                let time = start_time.elapsed().as_secs_f64();
                match message {
                    UIUserMessage::TimeLimitReached => {
                        writeln!(&mut buffered_out, "{}", style("Time Limit Reached").yellow().bold()).ok();
                    }
                    UIUserMessage::Log(msg) => {
                        writeln!(&mut buffered_out, "[{thread_id:?}] {time:>6.2}  {msg}").ok();
                    }
                    UIUserMessage::LogS(msg) => {
                        writeln!(&mut buffered_out, "[{thread_id:?}] {time:>6.2}  {msg}").ok();
                    }
                    UIUserMessage::StartPhase(title, _level) => {
                        writeln!(&mut buffered_out, "{}", pad_str_with(&format!("{thread_id:?}"), 30, Alignment::Center, None, '⎯')).ok();
                        writeln!(&mut buffered_out, "{}", style(pad_str(title, 30, Alignment::Center, None)).green()).ok();
                        writeln!(&mut buffered_out, "{}", "⎯".repeat(30)).ok();
                        buffered_out.flush().ok();
                    }
                    UIUserMessage::IterationFinish(state) => {
                        num_iterations += 1;
                        let line = format!("[{thread_id:?}] {time:>6.2} iteration {state}");
                        if state.stop_flags.is_empty() {
                            writeln!(&mut buffered_out, "{line}").ok();
                        } else {
                            writeln!(&mut buffered_out, "{}", style(line).bold()).ok();
                        }
                    }
                    UIUserMessage::LPSolveIterationFinish(state) => {
                        total_lp_runtime += state.lp_runtime;
                        writeln!(&mut buffered_out, "{}", style(format!("[{thread_id:?}] {time:>6.2} lp {state}")).dim()).ok();
                    }
                    UIUserMessage::PricingProblemFinish(state) => {
                        // always needed for statistics
                        total_pricing_runtime += state.runtime;
                        writeln!(&mut buffered_out, "{}", style(format!("[{thread_id:?}] {time:>6.2} pricing {state}")).dim()).ok();
                    }
                    UIUserMessage::ScalingPhase(state) => {
                        writeln!(&mut buffered_out, "[{thread_id:?}] {time:>6.2}  {} {state}", style("New scaling phase").cyan().bold()).ok();
                        buffered_out.flush().ok();
                    }
                    UIUserMessage::OracleSwitch { iteration, from, to } => {
                        writeln!(
                            &mut buffered_out,
                            "[{thread_id:?}] {time:>6.2}  {} after iteration {iteration}: {from} -> {to}",
                            style("Switching pricing oracle").black().on_green().bold()
                        )
                        .ok();
                        buffered_out.flush().ok();
                    }
                    UIUserMessage::PricingFailure { model, status } => {
                        num_pricing_failures += 1;
                        writeln!(
                            &mut buffered_out,
                            "[{thread_id:?}] {time:>6.2}  {} {model} exited with status {status}",
                            style("Column Gen Error").red().bold()
                        )
                        .ok();
                    }
                    UIUserMessage::ExitUi => {
                        writeln!(&mut buffered_out, "{}", pad_str_with("Statistics", 30, Alignment::Center, None, '⎯')).ok();
                        writeln!(&mut buffered_out, "iterations: {num_iterations} / pricing failures: {num_pricing_failures}").ok();
                        writeln!(&mut buffered_out, "total_lp_time: {total_lp_runtime:>8.2}s / total_pricing_time: {total_pricing_runtime:>8.2}s").ok();
                        if total_lp_runtime + total_pricing_runtime > 0.0 {
                            writeln!(
                                &mut buffered_out,
                                "{:>3.1}% spent in pricing vs lp",
                                total_pricing_runtime / (total_lp_runtime + total_pricing_runtime) * 100.0
                            )
                            .ok();
                        }
                        writeln!(&mut buffered_out, "{}", "⎯".repeat(30)).ok();
                        break;
                    }
                }
            }

            buffered_out.flush().ok();
        });

        #[cfg(feature = "disable_ui")]
        drop(receiver);

        Self {
            sender: UISender { sender },
        }
    }
}

#[derive(Clone)]
/// Holds all state updates that can influence the UI
pub enum UIUserMessage {
    LogS(&'static str),
    Log(String),
    TimeLimitReached,
    StartPhase(&'static str, u8),
    ExitUi,

    IterationFinish(IterationUIState),
    LPSolveIterationFinish(LPSolveIterationUIState),
    PricingProblemFinish(PricingProblemUIState),
    ScalingPhase(ScalingPhaseUIState),

    OracleSwitch { iteration: i64, from: String, to: String },
    PricingFailure { model: String, status: String },
}

#[derive(Clone)]
pub struct IterationUIState {
    pub solver: &'static str,
    pub iteration: i64,
    pub lamb: f64,
    pub phi: f64,
    pub tolerance: f64,
    pub stop_flags: StopFlags,
    pub num_columns: usize,
    pub runtime: f64,
}

impl Display for IterationUIState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:>5} {} lambda=<{:>10.8}> phi=<{:>10.6}> tolerance=<{:>8.5}> flags=<{}> cols=<{}> runtime=<{:>5.2}>",
            self.iteration, self.solver, self.lamb, self.phi, self.tolerance, self.stop_flags, self.num_columns, self.runtime
        )
    }
}

#[derive(Clone)]
pub struct LPSolveIterationUIState {
    pub obj: f64,
    pub lp_runtime: f64,
    pub num_columns: usize,
}

impl Display for LPSolveIterationUIState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "obj=<{:>10.8}> lp_runtime=<{:>5.2}> cols=<{}>", self.obj, self.lp_runtime, self.num_columns)
    }
}

#[derive(Clone)]
pub struct PricingProblemUIState {
    pub oracle: String,
    pub runtime: f64,
    pub num_trees: usize,
}

impl Display for PricingProblemUIState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} pricing_runtime=<{:>5.2}> num_trees=<{}>", self.oracle, self.runtime, self.num_trees)
    }
}

#[derive(Clone)]
pub struct ScalingPhaseUIState {
    pub iteration: i64,
    pub sigma: f64,
    pub t: f64,
    pub w: f64,
    pub lamb: f64,
}

impl Display for ScalingPhaseUIState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "iteration=<{}> sigma=<{}> t=<{:.6}> w=<{:.6}> lambda=<{:>10.8}>",
            self.iteration, self.sigma, self.t, self.w, self.lamb
        )
    }
}

#[derive(Clone)]
pub struct UIMessage {
    pub thread_id: ThreadId,
    pub message: UIUserMessage,
}
