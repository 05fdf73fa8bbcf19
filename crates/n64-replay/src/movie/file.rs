use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::header::{controller, start_flags, HEADER_SIZE};
use super::{InputSample, MovieError, MovieFreeze, MovieHeader};

/// A movie file loaded into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movie {
    pub header: MovieHeader,
    pub inputs: Vec<InputSample>,
}

pub fn parse_header(path: &Path) -> Result<MovieHeader, MovieError> {
    let mut buf = vec![0u8; HEADER_SIZE];
    let mut file = File::open(path)?;
    file.read_exact(&mut buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => MovieError::Truncated,
        _ => MovieError::Io(e),
    })?;
    MovieHeader::from_bytes(&buf)
}

pub fn read_movie(path: &Path) -> Result<Movie, MovieError> {
    let data = fs::read(path)?;
    let header = MovieHeader::from_bytes(&data)?;

    let wanted = header.length_samples as usize * InputSample::SIZE;
    let body = &data[HEADER_SIZE..];
    if body.len() < wanted {
        log::warn!(
            "[VCR] {:?} claims {} samples but holds {}",
            path,
            header.length_samples,
            body.len() / InputSample::SIZE
        );
        return Err(MovieError::Truncated);
    }
    let inputs = InputSample::parse_all(&body[..wanted]);
    Ok(Movie { header, inputs })
}

pub fn read_movie_inputs(path: &Path) -> Result<Vec<InputSample>, MovieError> {
    Ok(read_movie(path)?.inputs)
}

/// Write `header` followed by `inputs`; `length_samples` is taken from `inputs`.
pub fn write_movie(
    path: &Path,
    header: &MovieHeader,
    inputs: &[InputSample],
) -> Result<(), MovieError> {
    let mut header = header.clone();
    header.length_samples = inputs.len() as u32;

    let mut data = header.to_bytes();
    data.reserve(inputs.len() * InputSample::SIZE);
    for sample in inputs {
        data.extend_from_slice(&sample.to_raw().to_le_bytes());
    }
    fs::write(path, data)?;
    Ok(())
}

/// Rewrite author and description in the header, leaving the inputs alone.
pub fn replace_author_info(path: &Path, author: &str, description: &str) -> Result<(), MovieError> {
    let mut header = parse_header(path)?;
    header.author = author.to_string();
    header.description = description.to_string();

    let mut file = OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&header.to_bytes())?;
    file.flush()?;
    log::info!("[VCR] Replaced author info of {:?}", path);
    Ok(())
}

/// Rebuild a movie from the freeze buffer embedded in a savestate.
///
/// Only what the freeze carries survives: uid, sample count and VI
/// position. The result starts from a snapshot since the freeze came
/// from one.
pub fn convert_freeze_buffer_to_movie(freeze: &MovieFreeze) -> Result<Movie, MovieError> {
    if freeze.inputs.len() < freeze.length_samples as usize {
        return Err(MovieError::InvalidFormat);
    }
    let header = MovieHeader {
        uid: freeze.uid,
        length_samples: freeze.length_samples,
        length_vis: freeze.current_vi,
        start_flags: start_flags::FROM_SNAPSHOT,
        controller_flags: controller::present(0),
        author: "(no author)".to_string(),
        description: "(no description)".to_string(),
        ..MovieHeader::default()
    };
    Ok(Movie {
        header,
        inputs: freeze.samples().to_vec(),
    })
}
