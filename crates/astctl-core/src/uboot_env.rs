//! U-Boot environment injection into a flash image
//!
//! The environment sector holds a little-endian CRC32 of everything past
//! the header, a flag byte, then NUL-terminated `key=value` strings closed
//! by an empty string. The rest of the sector stays erased.

use crc::{Crc, CRC_32_ISO_HDLC};

use crate::error::{Error, Result};

/// Size of the environment sector
pub const ENV_SIZE: usize = 0x10000;
/// Offset of the environment sector in a 32 MiB image
pub const ENV_OFFSET: usize = 0x1fc_0000;
/// Image size for which [`ENV_OFFSET`] applies
pub const IMAGE_SIZE_32M: usize = 0x200_0000;

/// Bytes before the first variable (CRC32 + flag)
const HEADER_LEN: usize = 5;
/// Flag byte of an active environment copy
const FLAG_ACTIVE: u8 = 1;

const ENV_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Locate the environment sector of `image`
fn env_sector(image: &mut [u8]) -> Result<&mut [u8]> {
    match image.len() {
        IMAGE_SIZE_32M => Ok(&mut image[ENV_OFFSET..ENV_OFFSET + ENV_SIZE]),
        ENV_SIZE => Ok(image),
        len => Err(Error::Environment(format!(
            "where to put env in image of length {:#x}?",
            len
        ))),
    }
}

/// Write the variables of `env` (one `key=value` per line) into `image`
///
/// The environment sector must still be erased. Blank lines are ignored.
pub fn inject(image: &mut [u8], env: &str) -> Result<()> {
    let sector = env_sector(image)?;
    if sector.iter().any(|&b| b != 0xff) {
        return Err(Error::Environment(
            "env sector not originally cleared".into(),
        ));
    }

    let mut body = Vec::new();
    for line in env.lines().map(|l| l.trim_end_matches('\r')) {
        if line.is_empty() {
            continue;
        }
        if !line.contains('=') {
            return Err(Error::Environment(format!("missing '=' in {:?}", line)));
        }
        body.extend_from_slice(line.as_bytes());
        body.push(0);
    }
    body.push(0);

    if HEADER_LEN + body.len() > ENV_SIZE {
        return Err(Error::Environment(format!(
            "{} bytes of variables do not fit the {:#x} byte sector",
            body.len(),
            ENV_SIZE
        )));
    }

    sector[4] = FLAG_ACTIVE;
    sector[HEADER_LEN..HEADER_LEN + body.len()].copy_from_slice(&body);
    let crc = ENV_CRC.checksum(&sector[HEADER_LEN..]);
    sector[..4].copy_from_slice(&crc.to_le_bytes());
    log::debug!("u-boot env: {} bytes, crc {:#010x}", body.len(), crc);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_sector_image() {
        let mut image = vec![0xff; ENV_SIZE];
        inject(&mut image, "bootdelay=3\nbaudrate=115200\n").unwrap();

        assert_eq!(image[4], 1);
        let body = b"bootdelay=3\0baudrate=115200\0\0";
        assert_eq!(&image[5..5 + body.len()], body);
        assert_eq!(image[5 + body.len()], 0xff);

        let crc = u32::from_le_bytes([image[0], image[1], image[2], image[3]]);
        assert_eq!(crc, ENV_CRC.checksum(&image[5..]));
    }

    #[test]
    fn test_inject_full_image() {
        let mut image = vec![0xff; IMAGE_SIZE_32M];
        inject(&mut image, "a=b").unwrap();
        assert_eq!(image[ENV_OFFSET + 4], 1);
        assert_eq!(&image[ENV_OFFSET + 5..ENV_OFFSET + 10], b"a=b\0\0");
        assert!(image[..ENV_OFFSET].iter().all(|&b| b == 0xff));
    }

    #[test]
    fn test_inject_requires_erased_sector() {
        let mut image = vec![0xff; ENV_SIZE];
        image[0x100] = 0;
        let err = inject(&mut image, "a=b").unwrap_err();
        assert!(matches!(err, Error::Environment(_)));
    }

    #[test]
    fn test_inject_rejects_unknown_image_size() {
        let mut image = vec![0xff; 0x1000];
        assert!(inject(&mut image, "a=b").is_err());
    }

    #[test]
    fn test_inject_rejects_oversized_env() {
        let mut image = vec![0xff; ENV_SIZE];
        let env = format!("big={}", "x".repeat(ENV_SIZE));
        assert!(inject(&mut image, &env).is_err());
    }
}
