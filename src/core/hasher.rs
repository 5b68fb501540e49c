use serde::{Deserialize, Serialize, Serializer};
use sha2::digest::DynDigest;
use std::fmt;
use std::io::{self, Read, Write};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::utils::stream::{CancelToken, BUFFER_SIZE};
use crate::vfs::FileSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Md5,
    Sha1,
    #[default]
    Sha256,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Md5 => "md5",
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha256 => "sha256",
        }
    }

    pub fn hex_len(self) -> usize {
        match self {
            Algorithm::Md5 => 32,
            Algorithm::Sha1 => 40,
            Algorithm::Sha256 => 64,
        }
    }

    fn hasher(self) -> Box<dyn DynDigest + Send> {
        match self {
            Algorithm::Md5 => Box::new(md5::Md5::default()),
            Algorithm::Sha1 => Box::new(sha1::Sha1::default()),
            Algorithm::Sha256 => Box::new(sha2::Sha256::default()),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Algorithm::Md5),
            "sha1" => Ok(Algorithm::Sha1),
            "sha256" => Ok(Algorithm::Sha256),
            other => Err(Error::InvalidArgument(format!(
                "unknown digest algorithm: {}",
                other
            ))),
        }
    }
}

/// Empty `hex` marks an unreadable source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    pub algorithm: Algorithm,
    pub hex: String,
}

impl Digest {
    pub fn unreadable(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            hex: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hex.is_empty()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex)
    }
}

pub fn hash_buffer(data: &[u8], algorithm: Algorithm) -> Digest {
    let mut hasher = algorithm.hasher();
    hasher.update(data);
    Digest {
        algorithm,
        hex: hex::encode(hasher.finalize()),
    }
}

pub fn digest_of<R: Read + ?Sized>(
    reader: &mut R,
    algorithm: Algorithm,
    cancel: &CancelToken,
) -> Result<Digest> {
    let mut hasher = algorithm.hasher();
    let mut buffer = [0u8; BUFFER_SIZE];

    loop {
        cancel.check()?;
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::NotReadable(e.to_string())),
        };
        hasher.update(&buffer[..n]);
    }

    Ok(Digest {
        algorithm,
        hex: hex::encode(hasher.finalize()),
    })
}

pub fn digest_of_file(
    fs: &dyn FileSystem,
    path: &Path,
    algorithm: Algorithm,
    cancel: &CancelToken,
) -> Result<Digest> {
    let mut file = fs.open(path).map_err(|e| Error::read(path, e))?;
    digest_of(&mut file, algorithm, cancel).map_err(|e| match e {
        Error::NotReadable(msg) => Error::NotReadable(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

pub struct DigestWriter {
    algorithm: Algorithm,
    hasher: Box<dyn DynDigest + Send>,
}

impl DigestWriter {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            hasher: algorithm.hasher(),
        }
    }

    pub fn finish(self) -> Digest {
        Digest {
            algorithm: self.algorithm,
            hex: hex::encode(self.hasher.finalize()),
        }
    }
}

impl Write for DigestWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemFs;
    use std::io::Cursor;

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk on fire"))
        }
    }

    #[test]
    fn test_hash_buffer_empty() {
        assert_eq!(
            hash_buffer(b"", Algorithm::Sha256).hex,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            hash_buffer(b"", Algorithm::Sha1).hex,
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
        assert_eq!(
            hash_buffer(b"", Algorithm::Md5).hex,
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn test_single_byte_vectors() {
        let cancel = CancelToken::new();
        let cases = [
            (Algorithm::Md5, "0cc175b9c0f1b6a831c399e269772661"),
            (Algorithm::Sha1, "86f7e437faa5a7fce15d1ddcb9eaeaea377667b8"),
            (
                Algorithm::Sha256,
                "ca978112ca1bbdcafac231b39a23dc4da786eff8147c4e72b9807785afee48bb",
            ),
        ];
        for (algorithm, expected) in cases {
            let digest = digest_of(&mut Cursor::new(b"a"), algorithm, &cancel).unwrap();
            assert_eq!(digest.hex, expected);
            assert_eq!(digest.hex.len(), algorithm.hex_len());
        }
    }

    #[test]
    fn test_streaming_matches_buffer_across_boundaries() {
        let data: Vec<u8> = (0..(BUFFER_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let streamed =
            digest_of(&mut Cursor::new(&data), Algorithm::Sha256, &CancelToken::new()).unwrap();
        assert_eq!(streamed, hash_buffer(&data, Algorithm::Sha256));
    }

    #[test]
    fn test_read_failure_is_not_readable() {
        let err = digest_of(&mut BrokenReader, Algorithm::Md5, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, Error::NotReadable(_)));
    }

    #[test]
    fn test_cancelled_before_read() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = digest_of(&mut Cursor::new(b"abc"), Algorithm::Sha1, &cancel).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!("SHA256".parse::<Algorithm>().unwrap(), Algorithm::Sha256);
        assert_eq!("md5".parse::<Algorithm>().unwrap(), Algorithm::Md5);
        assert!(matches!(
            "crc32".parse::<Algorithm>(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_digest_of_file_missing_and_unreadable() {
        let fs = MemFs::new();
        fs.write_file("/data/ok", b"abc");
        fs.write_file("/data/bad", b"abc");
        fs.mark_unreadable("/data/bad");
        let cancel = CancelToken::new();

        let ok = digest_of_file(&fs, Path::new("/data/ok"), Algorithm::Md5, &cancel).unwrap();
        assert_eq!(ok.hex, "900150983cd24fb0d6963f7d28e17f72");

        assert!(matches!(
            digest_of_file(&fs, Path::new("/data/missing"), Algorithm::Md5, &cancel),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            digest_of_file(&fs, Path::new("/data/bad"), Algorithm::Md5, &cancel),
            Err(Error::NotReadable(_))
        ));
    }

    #[test]
    fn test_digest_writer_matches_buffer() {
        let mut writer = DigestWriter::new(Algorithm::Sha256);
        writer.write_all(b"ab").unwrap();
        writer.write_all(b"c").unwrap();
        assert_eq!(
            writer.finish().hex,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
