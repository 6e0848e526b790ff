#![no_main]

use libfuzzer_sys::fuzz_target;

use stevedore::line::Line;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        // Fuzz the formatter over arbitrary single-line fragments - this
        // should never panic, only ever return a block or EmptyFinalization
        let lines: Vec<Line> = content
            .lines()
            .map(|line| {
                if line.is_empty() {
                    Line::Break
                } else if let Some(rest) = line.strip_prefix('#') {
                    Line::comment(rest)
                } else {
                    Line::command(line)
                }
            })
            .collect();
        let _ = stevedore::format::render_block(&lines);
    }
});
