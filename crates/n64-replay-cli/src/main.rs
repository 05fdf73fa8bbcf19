use std::path::{Path, PathBuf};

use n64_replay::movie::{self, header::start_flags, MovieHeader};
use n64_replay::savestate::{codec, compress};
use n64_replay::ReplayConfig;

const USAGE: &str = "Usage: n64-replay <command> [args]

Commands:
  st-info <state>                         Describe a savestate file
  movie-info <movie.m64>                  Print a movie header
  set-author <movie.m64> <author> <desc>  Rewrite author info in place
  extract-movie <state> <out.m64>         Rebuild a movie from a state's freeze buffer
  config-init <config.json>               Write the default configuration";

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

fn read_state(path: &Path) -> codec::Decoded {
    let raw = std::fs::read(path)
        .unwrap_or_else(|e| fail(format!("Failed to read {}: {}", path.display(), e)));
    let data = compress::decompress(&raw)
        .unwrap_or_else(|e| fail(format!("Failed to decompress {}: {}", path.display(), e)));
    codec::decode(&data)
        .unwrap_or_else(|e| fail(format!("Failed to decode {}: {}", path.display(), e)))
}

fn nth(args: &[String], i: usize) -> &str {
    args.get(i).map(String::as_str).unwrap_or_else(|| fail(USAGE))
}

fn st_info(path: &Path) {
    let decoded = read_state(path);
    let s = &decoded.snapshot;
    println!("ROM hash:        {}", String::from_utf8_lossy(&s.rom_hash));
    println!("PC:              {:#010X}", s.cpu.pc);
    println!("COP0 Count:      {:#010X}", s.cpu.cop0[9]);
    println!("Next interrupt:  {:#010X}", s.interrupts.next_interrupt);
    println!("Pending events:  {}", s.interrupts.events.len());
    for event in &s.interrupts.events {
        println!("  kind {:#05X} at {:#010X}", event.kind, event.count);
    }
    println!("SI DMA skipped:  {}", decoded.skip_si_dma);
    match &s.movie {
        Some(freeze) => println!(
            "Movie:           uid {} at sample {}/{} (vi {})",
            freeze.uid, freeze.current_sample, freeze.length_samples, freeze.current_vi
        ),
        None => println!("Movie:           none"),
    }
    match &s.screenshot {
        Some(shot) => println!("Screenshot:      {}x{}", shot.width, shot.height),
        None => println!("Screenshot:      none"),
    }
}

fn print_header(header: &MovieHeader) {
    let seconds = header.length_vis as f64 / header.vis_per_second.max(1) as f64;
    println!("Version:         {}", header.version);
    println!("UID:             {}", header.uid);
    println!(
        "Length:          {} samples, {} VIs ({:.2}s)",
        header.length_samples, header.length_vis, seconds
    );
    println!("Rerecords:       {}", header.rerecord_count);
    println!("Controllers:     {}", header.num_controllers);
    let start = match header.start_flags {
        f if f & start_flags::FROM_SNAPSHOT != 0 => "snapshot",
        f if f & start_flags::FROM_EEPROM != 0 => "eeprom",
        f if f & start_flags::FROM_EXISTING_SNAPSHOT != 0 => "existing snapshot",
        _ => "power-on",
    };
    println!("Starts from:     {}", start);
    println!(
        "ROM:             {} (CRC {:08X}, country {:#06X})",
        header.rom_name, header.rom_crc1, header.rom_country
    );
    println!("Video plugin:    {}", header.plugins.video);
    println!("Audio plugin:    {}", header.plugins.audio);
    println!("Input plugin:    {}", header.plugins.input);
    println!("RSP plugin:      {}", header.plugins.rsp);
    println!("Author:          {}", header.author);
    println!("Description:     {}", header.description);
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    match nth(&args, 0) {
        "st-info" => st_info(Path::new(nth(&args, 1))),
        "movie-info" => {
            let header = movie::parse_header(Path::new(nth(&args, 1)))
                .unwrap_or_else(|e| fail(format!("Failed to read movie: {}", e)));
            print_header(&header);
        }
        "set-author" => {
            movie::replace_author_info(Path::new(nth(&args, 1)), nth(&args, 2), nth(&args, 3))
                .unwrap_or_else(|e| fail(format!("Failed to update movie: {}", e)));
        }
        "extract-movie" => {
            let decoded = read_state(Path::new(nth(&args, 1)));
            let freeze = decoded
                .snapshot
                .movie
                .unwrap_or_else(|| fail("The savestate holds no movie"));
            let rebuilt = movie::convert_freeze_buffer_to_movie(&freeze)
                .unwrap_or_else(|e| fail(format!("Failed to rebuild movie: {}", e)));
            let out = PathBuf::from(nth(&args, 2));
            movie::write_movie(&out, &rebuilt.header, &rebuilt.inputs)
                .unwrap_or_else(|e| fail(format!("Failed to write {}: {}", out.display(), e)));
            log::info!("Wrote {} samples to {}", rebuilt.inputs.len(), out.display());
        }
        "config-init" => {
            let out = Path::new(nth(&args, 1));
            ReplayConfig::default()
                .save_to_file(out)
                .unwrap_or_else(|e| fail(format!("Failed to write {}: {}", out.display(), e)));
        }
        "-h" | "--help" => println!("{}", USAGE),
        other => fail(format!("Unknown command {:?}\n\n{}", other, USAGE)),
    }
}
