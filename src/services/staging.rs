use crate::api::error::{AppError, UNSUPPORTED_TYPE_MESSAGE};
use crate::services::sniffer::{ContentSniffer, SNIFF_LEN};
use crate::utils::validation::{file_extension, sanitize_filename};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// An upload durably written to the scratch directory.
///
/// The file is removed by [`StagedFile::cleanup`], or on drop if cleanup was
/// never called.
#[derive(Debug)]
pub struct StagedFile {
    original_name: String,
    mime: &'static str,
    size: u64,
    path: TempPath,
}

impl StagedFile {
    /// Filename as sent by the client.
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Extension of the original filename including the dot, or "".
    pub fn extension(&self) -> String {
        file_extension(&self.original_name)
    }

    /// Sniffed MIME type.
    pub fn mime(&self) -> &'static str {
        self.mime
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the local copy and reports whether that worked.
    pub fn cleanup(self) -> io::Result<()> {
        self.path.close()
    }
}

/// Writes incoming uploads to uniquely named files in a scratch directory.
#[derive(Debug, Clone)]
pub struct StagingWriter {
    scratch_dir: PathBuf,
    sniffer: ContentSniffer,
    max_file_size: usize,
}

impl StagingWriter {
    pub fn new(scratch_dir: PathBuf, sniffer: ContentSniffer, max_file_size: usize) -> Self {
        Self {
            scratch_dir,
            sniffer,
            max_file_size,
        }
    }

    /// Sniffs the head of `reader` and, if the type is supported, copies the
    /// whole stream into a fresh scratch file.
    ///
    /// Read errors of kind `InvalidData` mean the client body was malformed
    /// or over the limit and become `BadInput`; other I/O errors become
    /// `IoFailure`. No scratch file survives a failed call.
    pub async fn stage<R>(&self, mut reader: R, filename: &str) -> Result<StagedFile, AppError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let display_name = sanitize_filename(filename);

        // 1. Peek into stream for magic bytes
        let mut header = [0u8; SNIFF_LEN];
        let mut n = 0;
        while n < SNIFF_LEN {
            let read = reader
                .read(&mut header[n..])
                .await
                .map_err(source_error)?;
            if read == 0 {
                break;
            }
            n += read;
        }
        let header = &header[..n];

        // 2. Reject before anything touches the disk
        let sniffed = self.sniffer.classify(header);
        let mime = match sniffed.mime {
            Some(mime) if sniffed.supported => mime,
            other => {
                tracing::info!(
                    "Rejected {}: sniffed type {:?} is not supported",
                    display_name,
                    other
                );
                return Err(AppError::BadInput(UNSUPPORTED_TYPE_MESSAGE.to_string()));
            }
        };

        // 3. Unique scratch file, never named after the client's filename
        let temp_file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&file_extension(filename))
            .tempfile_in(&self.scratch_dir)
            .map_err(|e| AppError::IoFailure(format!("Cannot create scratch file: {}", e)))?;
        let (file, temp_path) = temp_file.into_parts();
        let mut dst = tokio::fs::File::from_std(file);

        // A failure from here on drops `temp_path`, which removes the file
        let size = self.copy_body(header, &mut reader, &mut dst).await?;
        drop(dst);

        tracing::debug!(
            "Staged {} ({}, {} bytes) at {}",
            display_name,
            mime,
            size,
            temp_path.display()
        );

        Ok(StagedFile {
            original_name: filename.to_string(),
            mime,
            size,
            path: temp_path,
        })
    }

    async fn copy_body<R>(
        &self,
        header: &[u8],
        reader: &mut R,
        dst: &mut tokio::fs::File,
    ) -> Result<u64, AppError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut total = header.len() as u64;
        self.check_size(total)?;
        dst.write_all(header).await?;

        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        loop {
            let n = reader.read(&mut buffer).await.map_err(source_error)?;
            if n == 0 {
                break;
            }
            total += n as u64;
            self.check_size(total)?;
            dst.write_all(&buffer[..n]).await?;
        }

        dst.flush().await?;
        dst.sync_all().await?;
        Ok(total)
    }

    fn check_size(&self, size: u64) -> Result<(), AppError> {
        if size > self.max_file_size as u64 {
            return Err(AppError::BadInput(format!(
                "File exceeds the maximum allowed size of {} MB",
                self.max_file_size / 1024 / 1024
            )));
        }
        Ok(())
    }
}

fn source_error(e: io::Error) -> AppError {
    if e.kind() == io::ErrorKind::InvalidData {
        AppError::BadInput(e.to_string())
    } else {
        AppError::IoFailure(format!("Read error: {}", e))
    }
}
