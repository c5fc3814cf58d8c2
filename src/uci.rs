use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, error, warn};

use crate::engine::{Engine, EngineConfig, MAX_DEPTH};
use crate::evaluation::Evaluation;
use crate::movegen::MoveGenerator;
use crate::position::{Color, Position};

const ENGINE_NAME: &str = "Salmon Minimax";
const ENGINE_AUTHOR: &str = "Magnus Torvund";

/// Reads UCI commands and answers on `W`. Searches run on a worker thread
/// so `stop` and `isready` are still served while one is in flight.
pub struct UciHandler<W: Write + Send + 'static> {
    engine: Arc<Engine>,
    move_generator: MoveGenerator,
    output: Arc<Mutex<W>>,
    worker: Option<JoinHandle<()>>,
}

impl UciHandler<io::Stdout> {
    pub fn stdio(config: EngineConfig) -> Self {
        Self::new(config, io::stdout())
    }
}

impl<W: Write + Send + 'static> UciHandler<W> {
    pub fn new(config: EngineConfig, output: W) -> Self {
        UciHandler {
            engine: Arc::new(Engine::new(config)),
            move_generator: MoveGenerator::new(),
            output: Arc::new(Mutex::new(output)),
            worker: None,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Processes lines from `reader` until `quit` or end of input.
    pub fn run<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for line in reader.lines() {
            let line = line.context("failed to read command")?;
            if !self.handle_command(&line)? {
                break;
            }
        }
        self.stop_search()
    }

    /// Handles a single command line. Returns `false` once the session should end.
    pub fn handle_command(&mut self, command: &str) -> Result<bool> {
        let parts: Vec<&str> = command.split_whitespace().collect();
        let Some((&name, args)) = parts.split_first() else {
            return Ok(true);
        };
        debug!(command, "received");

        match name {
            "uci" => self.handle_uci()?,
            "isready" => send(&self.output, "readyok")?,
            "ucinewgame" => {
                self.stop_search()?;
                self.engine.set_position(Position::startpos());
            }
            "position" => {
                self.wait_for_search()?;
                match self.parse_position(args) {
                    Ok(position) => self.engine.set_position(position),
                    Err(err) => warn!("ignoring position command: {:#}", err),
                }
            }
            "go" => self.handle_go(args)?,
            "stop" => self.stop_search()?,
            "setoption" => self.handle_setoption(args),
            "d" => {
                self.wait_for_search()?;
                let position = self.engine.position();
                send(&self.output, &format!("{}Fen: {}", position, position.to_fen()))?;
            }
            "fen" => {
                self.wait_for_search()?;
                send(&self.output, &self.engine.position().to_fen())?;
            }
            "quit" => {
                self.stop_search()?;
                return Ok(false);
            }
            _ => warn!(command, "unknown command"),
        }
        Ok(true)
    }

    /// Blocks until the running search, if any, has printed its move.
    pub fn wait_for_search(&mut self) -> Result<()> {
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .map_err(|_| anyhow!("search thread panicked")),
            None => Ok(()),
        }
    }

    fn stop_search(&mut self) -> Result<()> {
        if self.worker.is_none() {
            return Ok(());
        }
        self.engine.cancel();
        self.wait_for_search()?;
        self.engine.clear_cancel();
        Ok(())
    }

    fn handle_uci(&self) -> Result<()> {
        let lines = [
            format!("id name {}", ENGINE_NAME),
            format!("id author {}", ENGINE_AUTHOR),
            format!(
                "option name Depth type spin default {} min 1 max {}",
                self.engine.depth(),
                MAX_DEPTH
            ),
            "uciok".to_string(),
        ];
        send(&self.output, &lines.join("\n"))
    }

    fn handle_setoption(&self, args: &[&str]) {
        match args {
            ["name", name, "value", value] if name.eq_ignore_ascii_case("depth") => {
                match value.parse::<u32>() {
                    Ok(depth) => self.engine.set_depth(depth),
                    Err(_) => warn!(value, "depth must be a positive number"),
                }
            }
            _ => warn!(?args, "unsupported option"),
        }
    }

    fn parse_position(&self, args: &[&str]) -> Result<Position> {
        let (mut position, rest) = match args.first() {
            Some(&"startpos") => (Position::startpos(), &args[1..]),
            Some(&"fen") => {
                let end = args.iter().position(|&t| t == "moves").unwrap_or(args.len());
                let fen = args[1..end].join(" ");
                let position =
                    Position::from_fen(&fen).with_context(|| format!("bad FEN '{}'", fen))?;
                (position, &args[end..])
            }
            _ => bail!("expected 'startpos' or 'fen'"),
        };

        match rest.split_first() {
            None => {}
            Some((&"moves", moves)) => {
                for text in moves {
                    let mv = self.move_generator.legal_move_from_uci(&position, text)?;
                    position.apply(mv);
                }
            }
            Some((token, _)) => bail!("unexpected token '{}'", token),
        }
        Ok(position)
    }

    fn handle_go(&mut self, args: &[&str]) -> Result<()> {
        self.wait_for_search()?;

        let mut tokens = args.iter();
        while let Some(&token) = tokens.next() {
            match token {
                "depth" => match tokens.next().and_then(|d| d.parse::<u32>().ok()) {
                    Some(depth) => self.engine.set_depth(depth),
                    None => warn!("go depth needs a number"),
                },
                other => debug!(other, "ignoring go parameter"),
            }
        }

        let side = self.engine.position().side_to_move;
        let engine = Arc::clone(&self.engine);
        let output = Arc::clone(&self.output);
        self.worker = Some(thread::spawn(move || {
            let result = engine.search();
            let best = result
                .best_move
                .map_or_else(|| "0000".to_string(), |mv| mv.to_uci());
            let report = format!(
                "info depth {} score {} nodes {}\nbestmove {}",
                result.depth,
                uci_score(result.evaluation, side),
                result.nodes,
                best
            );
            if let Err(err) = send(&output, &report) {
                error!("failed to write search result: {:#}", err);
            }
        }));
        Ok(())
    }
}

/// Formats an evaluation as a UCI `score` from `side`'s point of view.
pub fn uci_score(evaluation: Evaluation, side: Color) -> String {
    let sign = side.sign() as i32;
    match evaluation {
        Evaluation::Score(score) => format!("cp {}", (score * 100.0).round() as i32 * sign),
        Evaluation::Draw => "cp 0".to_string(),
        Evaluation::Mate { winner, plies } => {
            let moves = ((plies + 1) / 2) as i32;
            if winner == side {
                format!("mate {}", moves)
            } else {
                format!("mate {}", -moves)
            }
        }
    }
}

fn send<W: Write>(output: &Mutex<W>, text: &str) -> Result<()> {
    let mut out = output.lock().unwrap_or_else(PoisonError::into_inner);
    writeln!(out, "{}", text).context("failed to write to GUI")?;
    out.flush().context("failed to flush output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn handler(depth: u32) -> (UciHandler<SharedBuffer>, SharedBuffer) {
        let buffer = SharedBuffer::default();
        (UciHandler::new(EngineConfig::with_depth(depth), buffer.clone()), buffer)
    }

    #[test]
    fn test_uci_handshake() {
        let (mut uci, out) = handler(3);
        assert!(uci.handle_command("uci").unwrap());
        assert!(uci.handle_command("isready").unwrap());
        let text = out.text();
        assert!(text.starts_with("id name Salmon Minimax\n"));
        assert!(text.contains("option name Depth type spin default 3 min 1 max 8\n"));
        assert!(text.contains("uciok\nreadyok\n"));
    }

    #[test]
    fn test_position_with_moves() {
        let (mut uci, _) = handler(1);
        uci.handle_command("position startpos moves e2e4 e7e5").unwrap();
        assert_eq!(
            uci.engine().position().to_fen(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2"
        );

        uci.handle_command("position fen 8/8/8/8/8/8/4k3/K7 w - - 0 1 moves a1b2").unwrap();
        assert_eq!(uci.engine().position().to_fen(), "8/8/8/8/8/8/1K2k3/8 b - - 1 1");
    }

    #[test]
    fn test_bad_position_is_ignored() {
        let (mut uci, _) = handler(1);
        uci.handle_command("position startpos moves e2e4").unwrap();
        let before = uci.engine().position();

        assert!(uci.handle_command("position fen not a fen").unwrap());
        assert!(uci.handle_command("position startpos moves e2e5").unwrap());
        assert!(uci.handle_command("position sideways").unwrap());
        assert_eq!(uci.engine().position(), before);
    }

    #[test]
    fn test_go_prints_bestmove() {
        let (mut uci, out) = handler(3);
        uci.handle_command("position fen 6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1").unwrap();
        uci.handle_command("go depth 1").unwrap();
        uci.wait_for_search().unwrap();

        let text = out.text();
        assert!(text.contains("info depth 1 score mate 1 nodes "), "{}", text);
        assert!(text.ends_with("bestmove a1a8\n"), "{}", text);
        assert_eq!(uci.engine().depth(), 1);
    }

    #[test]
    fn test_go_without_moves_prints_null_move() {
        let (mut uci, out) = handler(2);
        uci.handle_command("position fen 8/8/8/8/8/1q6/2k5/K7 w - - 0 1").unwrap();
        uci.handle_command("go").unwrap();
        uci.wait_for_search().unwrap();
        assert!(out.text().ends_with("info depth 2 score cp 0 nodes 1\nbestmove 0000\n"));
    }

    #[test]
    fn test_debug_output() {
        let (mut uci, out) = handler(1);
        uci.handle_command("position startpos moves g1f3").unwrap();
        uci.handle_command("fen").unwrap();
        uci.handle_command("d").unwrap();
        let text = out.text();
        let fen = "rnbqkbnr/pppppppp/8/8/8/5N2/PPPPPPPP/RNBQKB1R b KQkq - 1 1";
        assert!(text.starts_with(&format!("{}\n8 r n b q k b n r\n", fen)), "{}", text);
        assert!(text.ends_with(&format!("  a b c d e f g h\nFen: {}\n", fen)), "{}", text);
    }

    #[test]
    fn test_setoption_depth() {
        let (mut uci, _) = handler(3);
        uci.handle_command("setoption name Depth value 5").unwrap();
        assert_eq!(uci.engine().depth(), 5);
        uci.handle_command("setoption name Depth value 40").unwrap();
        assert_eq!(uci.engine().depth(), MAX_DEPTH);
        uci.handle_command("setoption name Depth value lots").unwrap();
        assert_eq!(uci.engine().depth(), MAX_DEPTH);
    }

    #[test]
    fn test_stop_returns_a_move() {
        let (mut uci, out) = handler(4);
        uci.handle_command("go").unwrap();
        uci.handle_command("stop").unwrap();
        let text = out.text();
        let best = text.lines().last().unwrap().strip_prefix("bestmove ").unwrap();
        let legal = MoveGenerator::new().generate_moves(&Position::startpos());
        assert!(legal.iter().any(|mv| mv.to_uci() == best), "{}", text);
    }

    #[test]
    fn test_run_until_quit() {
        let (mut uci, out) = handler(1);
        let input = "uci\nbogus command\nposition startpos\ngo\nquit\nisready\n";
        uci.run(Cursor::new(input)).unwrap();
        let text = out.text();
        assert!(text.contains("bestmove "));
        assert!(!text.contains("readyok"));
    }

    #[test]
    fn test_uci_score_perspective() {
        assert_eq!(uci_score(Evaluation::Score(0.5), Color::White), "cp 50");
        assert_eq!(uci_score(Evaluation::Score(0.5), Color::Black), "cp -50");
        assert_eq!(uci_score(Evaluation::Draw, Color::Black), "cp 0");
        let white_mates = |plies| Evaluation::Mate {
            winner: Color::White,
            plies,
        };
        assert_eq!(uci_score(white_mates(1), Color::White), "mate 1");
        assert_eq!(uci_score(white_mates(3), Color::White), "mate 2");
        assert_eq!(uci_score(white_mates(2), Color::Black), "mate -1");
    }
}
