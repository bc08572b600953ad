//! Forced removal of files and directories.
//!
//! The `rm -f` of Unix has no direct Windows equivalent: a read-only
//! attribute blocks the deletion, an open handle without share-delete
//! blocks the open, and a directory must be empty. This module works
//! through all three with the NT native API. A target that cannot be
//! deleted in place is renamed into `<volume>\tmp\trash\` first, so at
//! least its visible name is gone; the trash entry disappears when the
//! last open handle to it goes away.

use log::debug;
use std::mem;
use std::ptr;
use windows_sys::Wdk::Foundation::{NtClose, FILE_BASIC_INFORMATION, OBJECT_ATTRIBUTES};
use windows_sys::Wdk::Storage::FileSystem::{
    NtOpenFile, NtQueryAttributesFile, NtQueryDirectoryFile, NtQueryInformationFile,
    NtSetInformationFile, FileBasicInformation, FileDispositionInformation,
    FileInternalInformation, FileNamesInformation, FileRenameInformation,
    FILE_DELETE_ON_CLOSE, FILE_DISPOSITION_INFORMATION, FILE_INTERNAL_INFORMATION,
    FILE_NAMES_INFORMATION, FILE_OPEN_FOR_BACKUP_INTENT, FILE_RENAME_INFORMATION,
    FILE_SYNCHRONOUS_IO_NONALERT,
};
use windows_sys::Win32::Foundation::{
    HANDLE, MAX_PATH, NTSTATUS, STATUS_CANNOT_DELETE, STATUS_DELETE_PENDING,
    STATUS_DIRECTORY_NOT_EMPTY, STATUS_NO_MORE_FILES, STATUS_OBJECT_NAME_NOT_FOUND,
    STATUS_OBJECT_PATH_NOT_FOUND, STATUS_SHARING_VIOLATION, STATUS_SUCCESS, UNICODE_STRING,
};
use windows_sys::Win32::Storage::FileSystem::{
    GetVolumePathNameW, DELETE, FILE_ATTRIBUTE_DIRECTORY, FILE_ATTRIBUTE_READONLY,
    FILE_LIST_DIRECTORY, FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE,
    FILE_WRITE_ATTRIBUTES, SYNCHRONIZE,
};
use windows_sys::Win32::System::Kernel::OBJ_CASE_INSENSITIVE;
use windows_sys::Win32::System::Threading::Sleep;
use windows_sys::Win32::System::IO::IO_STATUS_BLOCK;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";
const TRASH_DIR: &str = "tmp\\trash\\";

const OPEN_ATTEMPTS: u32 = 10;
const DELETE_ATTEMPTS: u32 = 20;
const DELETE_ATTEMPTS_MOVED: u32 = 5;
const RETRY_SLEEP_MS: u32 = 5;

const SHARE_VALID_FLAGS: u32 = FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE;

/// Which stage of [`safe_unlink`] gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlinkReason {
    /// The initial attribute query failed; the target is likely gone
    /// or unreachable.
    Query,
    /// The target could not be opened for deletion.
    Open,
    /// Another process holds the target open without sharing it, and
    /// the retry budget ran out.
    Sharing,
    /// The delete disposition could not be applied; for a directory
    /// this usually means it is not empty.
    Delete,
}

/// A failed [`safe_unlink`], carrying the NT status of the losing stage.
#[derive(Debug, thiserror::Error)]
#[error("cannot remove the file: {reason:?} stage failed with status {status:#010x}")]
pub struct UnlinkError {
    pub status: NTSTATUS,
    pub reason: UnlinkReason,
}

fn nt_success(status: NTSTATUS) -> bool {
    status >= 0
}

/// Removes the file or directory named by `path`, an NT native path of
/// the form `\??\C:\...` without a terminating nul.
///
/// A read-only attribute is cleared first. When another process holds
/// the target open, it is renamed into the volume's `tmp\trash\`
/// directory (keyed by its file id) and deleted from there, so the
/// visible name disappears either way. Directories are only removed
/// when nothing but already-deleted entries remain in them.
pub fn safe_unlink(path: &[u16]) -> Result<(), UnlinkError> {
    let mut name = unicode_string(path);
    let mut attr = object_attributes(&mut name, ptr::null_mut());
    let mut io_status: IO_STATUS_BLOCK = unsafe { mem::zeroed() };

    let mut basic: FILE_BASIC_INFORMATION = unsafe { mem::zeroed() };
    let status = unsafe { NtQueryAttributesFile(&attr, &mut basic) };
    if !nt_success(status) {
        return Err(UnlinkError {
            status,
            reason: UnlinkReason::Query,
        });
    }

    // A read-only target cannot take a delete disposition; clearing the
    // bit up front is much cheaper than the rename fallback.
    if basic.FileAttributes & FILE_ATTRIBUTE_READONLY != 0 {
        clear_readonly(&mut attr, &mut basic)?;
    }

    let is_dir = basic.FileAttributes & FILE_ATTRIBUTE_DIRECTORY != 0;
    let mut access = DELETE;
    let mut flags = FILE_OPEN_FOR_BACKUP_INTENT;
    if is_dir {
        // Deleting a directory may require listing its content.
        access |= FILE_LIST_DIRECTORY | SYNCHRONIZE;
        flags |= FILE_SYNCHRONOUS_IO_NONALERT;
    }

    // Open for deletion. On a sharing conflict the share mode widens to
    // everything and the plan changes to renaming the target away.
    let mut share = FILE_SHARE_DELETE;
    let mut try_move_away = false;
    let mut handle: HANDLE = ptr::null_mut();
    let mut attempts = OPEN_ATTEMPTS;
    loop {
        let status = unsafe {
            NtOpenFile(
                &mut handle,
                access,
                &mut attr,
                &mut io_status,
                share,
                flags,
            )
        };

        if status == STATUS_SHARING_VIOLATION {
            share = SHARE_VALID_FLAGS;
            try_move_away = true;
            if attempts < 2 {
                return Err(UnlinkError {
                    status,
                    reason: UnlinkReason::Sharing,
                });
            }
        } else if status == STATUS_DELETE_PENDING {
            // Someone else is deleting it already; nothing left to do.
            debug!("delete already pending");
            return Ok(());
        } else if !nt_success(status) {
            return Err(UnlinkError {
                status,
                reason: UnlinkReason::Open,
            });
        } else {
            break;
        }

        unsafe { Sleep(RETRY_SLEEP_MS) };
        attempts -= 1;
    }
    let handle = HandleGuard(handle);

    let mut status = STATUS_SUCCESS;
    let mut moved_away = false;
    if try_move_away {
        // Never rename a populated directory into the trash; its
        // content would silently move with it.
        if is_dir {
            status = is_dir_empty(handle.0);
        }

        if nt_success(status) {
            status = move_away(handle.0, path);
            if nt_success(status) {
                moved_away = true;
            }
        }
    }

    // The handle is open and, if necessary, points into the trash now.
    // The disposition may still need several rounds, e.g. while a
    // directory empties out or a mapped image is released. A moved
    // target is no longer in anyone's way, so fewer rounds suffice.
    let mut attempts = if moved_away {
        DELETE_ATTEMPTS_MOVED
    } else {
        DELETE_ATTEMPTS
    };
    let mut known_empty = false;

    if nt_success(status) {
        loop {
            let disposition = FILE_DISPOSITION_INFORMATION { DeleteFile: 1 };
            status = unsafe {
                NtSetInformationFile(
                    handle.0,
                    &mut io_status,
                    &disposition as *const _ as *const _,
                    mem::size_of::<FILE_DISPOSITION_INFORMATION>() as u32,
                    FileDispositionInformation,
                )
            };
            if nt_success(status) {
                break;
            }

            if status == STATUS_DIRECTORY_NOT_EMPTY {
                if !known_empty {
                    known_empty = nt_success(is_dir_empty(handle.0));
                }
                if !known_empty {
                    // Truly populated; retrying cannot help.
                    break;
                }
            } else if status == STATUS_CANNOT_DELETE {
                if !try_move_away {
                    let move_status = move_away(handle.0, path);
                    try_move_away = true;
                    if nt_success(move_status) {
                        moved_away = true;
                    }
                }

                // Reopen through our own handle with delete-on-close;
                // closing that second handle then takes the file along.
                status = reopen_delete_on_close(handle.0, access, share, flags);
                if nt_success(status) {
                    break;
                }
            } else {
                break;
            }

            attempts -= 1;
            if attempts == 0 {
                break;
            }
            unsafe { Sleep(RETRY_SLEEP_MS) };
        }
    }

    drop(handle);

    if nt_success(status) {
        return Ok(());
    }
    if moved_away {
        // The visible name is gone; the trash entry follows once every
        // open handle to it is closed.
        debug!("moved away but final delete failed ({:#010x})", status);
        return Ok(());
    }

    Err(UnlinkError {
        status,
        reason: UnlinkReason::Delete,
    })
}

struct HandleGuard(HANDLE);

impl Drop for HandleGuard {
    fn drop(&mut self) {
        unsafe { NtClose(self.0) };
    }
}

fn unicode_string(path: &[u16]) -> UNICODE_STRING {
    UNICODE_STRING {
        Length: (path.len() * 2) as u16,
        MaximumLength: (path.len() * 2) as u16,
        Buffer: path.as_ptr() as *mut u16,
    }
}

fn object_attributes(name: *mut UNICODE_STRING, root: HANDLE) -> OBJECT_ATTRIBUTES {
    OBJECT_ATTRIBUTES {
        Length: mem::size_of::<OBJECT_ATTRIBUTES>() as u32,
        RootDirectory: root,
        ObjectName: name,
        Attributes: OBJ_CASE_INSENSITIVE as u32,
        SecurityDescriptor: ptr::null(),
        SecurityQualityOfService: ptr::null(),
    }
}

/// Drops `FILE_ATTRIBUTE_READONLY` and refreshes `basic` from a fresh
/// query. An open failure here is not fatal, the deletion may still go
/// through the rename path; a failing re-query is.
fn clear_readonly(
    attr: &mut OBJECT_ATTRIBUTES,
    basic: &mut FILE_BASIC_INFORMATION,
) -> Result<(), UnlinkError> {
    let mut io_status: IO_STATUS_BLOCK = unsafe { mem::zeroed() };
    let mut handle: HANDLE = ptr::null_mut();

    let status = unsafe {
        NtOpenFile(
            &mut handle,
            FILE_WRITE_ATTRIBUTES,
            attr,
            &mut io_status,
            SHARE_VALID_FLAGS,
            FILE_OPEN_FOR_BACKUP_INTENT,
        )
    };
    if nt_success(status) {
        basic.FileAttributes &= !FILE_ATTRIBUTE_READONLY;
        let set_status = unsafe {
            NtSetInformationFile(
                handle,
                &mut io_status,
                basic as *mut _ as *const _,
                mem::size_of::<FILE_BASIC_INFORMATION>() as u32,
                FileBasicInformation,
            )
        };
        if !nt_success(set_status) {
            debug!("clearing read-only failed ({:#010x})", set_status);
        }
        unsafe { NtClose(handle) };

        let status = unsafe { NtQueryAttributesFile(attr, basic) };
        if !nt_success(status) {
            return Err(UnlinkError {
                status,
                reason: UnlinkReason::Query,
            });
        }
    }

    Ok(())
}

/// Renames the open file `handle` (named by the NT path `path`) into
/// the trash directory of its own volume, under a name derived from
/// its file id. Rename cannot cross volumes, which is exactly why the
/// trash lives on the same one.
fn move_away(handle: HANDLE, path: &[u16]) -> NTSTATUS {
    if path.len() + 1 > MAX_PATH as usize {
        return STATUS_OBJECT_PATH_NOT_FOUND;
    }

    // Resolve the volume mount root; GetVolumePathNameW speaks the DOS
    // namespace, so the leading \??\ is skipped.
    let mut dos_path = [0u16; MAX_PATH as usize];
    dos_path[..path.len()].copy_from_slice(path);
    let mut root = [0u16; MAX_PATH as usize];
    let ok = unsafe {
        GetVolumePathNameW(dos_path.as_ptr().add(4), root.as_mut_ptr(), MAX_PATH)
    };
    if ok == 0 {
        return STATUS_OBJECT_PATH_NOT_FOUND;
    }
    let root_len = root.iter().position(|&c| c == 0).unwrap_or(root.len());

    let mut dest: Vec<u16> = Vec::with_capacity(MAX_PATH as usize);
    dest.extend("\\??\\".encode_utf16());
    dest.extend_from_slice(&root[..root_len]);
    dest.extend(TRASH_DIR.encode_utf16());

    // The file id is unique per volume; its nibbles, highest first,
    // name the trash entry.
    let mut io_status: IO_STATUS_BLOCK = unsafe { mem::zeroed() };
    let mut internal: FILE_INTERNAL_INFORMATION = unsafe { mem::zeroed() };
    let status = unsafe {
        NtQueryInformationFile(
            handle,
            &mut io_status,
            &mut internal as *mut _ as *mut _,
            mem::size_of::<FILE_INTERNAL_INFORMATION>() as u32,
            FileInternalInformation,
        )
    };
    if !nt_success(status) {
        return status;
    }

    let mut file_id = internal.IndexNumber as u64;
    let mut digits = [0u16; 16];
    for digit in digits.iter_mut().rev() {
        *digit = u16::from(HEX_DIGITS[(file_id & 0xf) as usize]);
        file_id >>= 4;
    }
    dest.extend_from_slice(&digits);

    let name_bytes = dest.len() * 2;
    let info_len = mem::size_of::<FILE_RENAME_INFORMATION>() + name_bytes;
    let mut info_buf = vec![0u8; info_len];
    let info = info_buf.as_mut_ptr() as *mut FILE_RENAME_INFORMATION;
    unsafe {
        (*info).Anonymous.ReplaceIfExists = 1;
        (*info).RootDirectory = ptr::null_mut();
        (*info).FileNameLength = name_bytes as u32;
        ptr::copy_nonoverlapping(dest.as_ptr(), (*info).FileName.as_mut_ptr(), dest.len());
    }

    let status = unsafe {
        NtSetInformationFile(
            handle,
            &mut io_status,
            info_buf.as_ptr() as *const _,
            info_len as u32,
            FileRenameInformation,
        )
    };
    if !nt_success(status) {
        debug!(
            "rename to {} failed ({:#010x})",
            String::from_utf16_lossy(&dest),
            status
        );
    }
    status
}

/// Opens the file behind `handle` once more, relative to itself, with
/// `FILE_DELETE_ON_CLOSE`, and closes that second handle right away.
fn reopen_delete_on_close(handle: HANDLE, access: u32, share: u32, flags: u32) -> NTSTATUS {
    let mut empty_name = unicode_string(&[]);
    let mut attr = object_attributes(&mut empty_name, handle);
    let mut io_status: IO_STATUS_BLOCK = unsafe { mem::zeroed() };

    let mut second: HANDLE = ptr::null_mut();
    let status = unsafe {
        NtOpenFile(
            &mut second,
            access,
            &mut attr,
            &mut io_status,
            share,
            flags | FILE_DELETE_ON_CLOSE,
        )
    };
    if nt_success(status) {
        unsafe { NtClose(second) };
    }
    status
}

/// Whether the directory behind `handle` holds nothing besides entries
/// that are already on their way out.
///
/// Entries whose relative attribute query comes back "delete pending"
/// or "not found" lost a race with another deleter and do not count.
fn is_dir_empty(handle: HANDLE) -> NTSTATUS {
    // Room for at least three names, so the common case (just "." and
    // "..") is answered with a single system call.
    const ENTRY_SPACE: usize =
        mem::size_of::<FILE_NAMES_INFORMATION>() + MAX_PATH as usize * 2;
    let mut buf = vec![0u8; 3 * ENTRY_SPACE];
    let mut io_status: IO_STATUS_BLOCK = unsafe { mem::zeroed() };

    let mut status = unsafe {
        NtQueryDirectoryFile(
            handle,
            ptr::null_mut(),
            None,
            ptr::null(),
            &mut io_status,
            buf.as_mut_ptr() as *mut _,
            buf.len() as u32,
            FileNamesInformation,
            0,
            ptr::null(),
            1,
        )
    };
    if status == STATUS_NO_MORE_FILES {
        return STATUS_SUCCESS;
    }

    // The first two entries are expected to be "." and "..".
    let mut skip = 2;

    while nt_success(status) {
        let mut offset = 0usize;
        loop {
            let entry = unsafe { &*(buf.as_ptr().add(offset) as *const FILE_NAMES_INFORMATION) };

            if skip > 0 {
                skip -= 1;
            } else {
                let mut entry_name = UNICODE_STRING {
                    Length: entry.FileNameLength as u16,
                    MaximumLength: entry.FileNameLength as u16,
                    Buffer: entry.FileName.as_ptr() as *mut u16,
                };
                let attr = object_attributes(&mut entry_name, handle);
                let mut basic: FILE_BASIC_INFORMATION = unsafe { mem::zeroed() };
                let entry_status = unsafe { NtQueryAttributesFile(&attr, &mut basic) };
                if entry_status != STATUS_DELETE_PENDING
                    && entry_status != STATUS_OBJECT_NAME_NOT_FOUND
                    && entry_status != STATUS_OBJECT_PATH_NOT_FOUND
                {
                    return STATUS_DIRECTORY_NOT_EMPTY;
                }
            }

            if entry.NextEntryOffset == 0 {
                break;
            }
            offset += entry.NextEntryOffset as usize;
        }

        status = unsafe {
            NtQueryDirectoryFile(
                handle,
                ptr::null_mut(),
                None,
                ptr::null(),
                &mut io_status,
                buf.as_mut_ptr() as *mut _,
                buf.len() as u32,
                FileNamesInformation,
                0,
                ptr::null(),
                0,
            )
        };
    }

    STATUS_SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::windows::fs::OpenOptionsExt;
    use std::path::{Path, PathBuf};

    fn nt_path(path: &Path) -> Vec<u16> {
        format!(r"\??\{}", path.display()).encode_utf16().collect()
    }

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{}-{}", name, std::process::id()))
    }

    #[test]
    fn removes_a_regular_file() {
        let path = scratch("unlink-plain.txt");
        fs::write(&path, b"payload").unwrap();

        safe_unlink(&nt_path(&path)).unwrap();

        assert!(!path.exists());
    }

    #[test]
    fn removes_a_read_only_file() {
        let path = scratch("unlink-ro.txt");
        fs::write(&path, b"payload").unwrap();
        let mut perm = fs::metadata(&path).unwrap().permissions();
        perm.set_readonly(true);
        fs::set_permissions(&path, perm).unwrap();

        safe_unlink(&nt_path(&path)).unwrap();

        assert!(!path.exists());
    }

    #[test]
    fn removes_an_empty_directory() {
        let path = scratch("unlink-dir");
        fs::create_dir(&path).unwrap();

        safe_unlink(&nt_path(&path)).unwrap();

        assert!(!path.exists());
    }

    #[test]
    fn refuses_a_populated_directory() {
        let path = scratch("unlink-full-dir");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep.txt"), b"still here").unwrap();

        let err = safe_unlink(&nt_path(&path)).unwrap_err();

        assert_eq!(err.status, STATUS_DIRECTORY_NOT_EMPTY);
        assert!(path.join("keep.txt").exists());

        fs::remove_dir_all(&path).unwrap();
    }

    #[test]
    fn missing_target_fails_the_query() {
        let path = scratch("unlink-none.txt");

        let err = safe_unlink(&nt_path(&path)).unwrap_err();

        assert_eq!(err.reason, UnlinkReason::Query);
    }

    #[test]
    fn locked_target_exhausts_the_retries() {
        let path = scratch("unlink-locked.txt");
        fs::write(&path, b"payload").unwrap();

        // Shared with nobody; even the widened share mode cannot help.
        let _holder = fs::OpenOptions::new()
            .read(true)
            .share_mode(0)
            .open(&path)
            .unwrap();

        let err = safe_unlink(&nt_path(&path)).unwrap_err();
        assert_eq!(err.reason, UnlinkReason::Sharing);

        drop(_holder);
        fs::remove_file(&path).unwrap();
    }

    // Needs <volume>\tmp\trash to exist, which is a deployment concern.
    #[test]
    #[ignore = "requires a tmp\\trash directory on the volume"]
    fn open_target_is_moved_away() {
        let path = scratch("unlink-open.txt");
        fs::write(&path, b"payload").unwrap();

        // A plain reader without delete sharing forces the rename path.
        let _holder = fs::OpenOptions::new()
            .read(true)
            .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE)
            .open(&path)
            .unwrap();

        safe_unlink(&nt_path(&path)).unwrap();

        // The visible name is gone even while the handle lives on.
        assert!(!path.exists());
    }
}
