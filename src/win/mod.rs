//! Child processes over anonymous pipes.
//!
//! Windows offers no usable pseudo terminal for this, so the same
//! spawn/read/write/signal/reap contract is provided over a pair of
//! inheritable anonymous pipes. The child gets a console of its own;
//! interrupts are synthesized into it as keystrokes.

mod cmdline;
pub mod unlink;

use crate::error::{Error, Result};
use cmdline::build_command_line;
use log::warn;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::mem;
use std::os::windows::io::{AsRawHandle, FromRawHandle, OwnedHandle, RawHandle};
use std::ptr;
use windows_sys::Win32::Foundation::{
    SetHandleInformation, FALSE, HANDLE, HANDLE_FLAG_INHERIT, HWND, LPARAM, STILL_ACTIVE, TRUE,
    WAIT_OBJECT_0,
};
use windows_sys::Win32::Security::SECURITY_ATTRIBUTES;
use windows_sys::Win32::System::Console::{GenerateConsoleCtrlEvent, CTRL_BREAK_EVENT};
use windows_sys::Win32::System::Diagnostics::Debug::{
    IMAGE_NT_SIGNATURE, IMAGE_SUBSYSTEM_NATIVE, IMAGE_SUBSYSTEM_OS2_CUI,
    IMAGE_SUBSYSTEM_POSIX_CUI, IMAGE_SUBSYSTEM_UNKNOWN, IMAGE_SUBSYSTEM_WINDOWS_CUI,
};
use windows_sys::Win32::System::Pipes::CreatePipe;
use windows_sys::Win32::System::SystemServices::IMAGE_DOS_SIGNATURE;
use windows_sys::Win32::System::Threading::{
    CreateProcessW, GetCurrentThreadId, GetExitCodeProcess, Sleep, TerminateProcess,
    WaitForSingleObject, CREATE_NEW_CONSOLE, INFINITE, PROCESS_INFORMATION, STARTF_USESHOWWINDOW,
    STARTF_USESTDHANDLES, STARTUPINFOW,
};
use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
    keybd_event, AttachThreadInput, MapVirtualKeyW, KEYEVENTF_KEYUP, MAPVK_VK_TO_VSC, VK_CONTROL,
};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClassNameW, GetForegroundWindow, GetWindowThreadProcessId,
    SetForegroundWindow, SW_HIDE,
};

/// PipeProcess controls a child process spawned with its std streams
/// bound to anonymous pipes.
///
/// The child's stderr is always aliased to the same pipe as its stdout.
#[derive(Debug)]
pub struct PipeProcess {
    process: OwnedHandle,
    thread: OwnedHandle,
    pid: u32,
    /// Parent side of the child's stdin pipe.
    input: Option<OwnedHandle>,
    /// Parent side of the child's stdout (and stderr) pipe.
    output: Option<OwnedHandle>,
}

impl PipeProcess {
    /// Spawns `argv` with a fresh console and pipes wired to its std
    /// streams.
    ///
    /// Console programs get their console hidden; when the subsystem of
    /// the executable cannot be determined the command is relaunched
    /// through `cmd /c`.
    pub fn spawn<S: AsRef<OsStr>>(argv: &[S]) -> Result<Self> {
        if argv.is_empty() {
            return Err(Error::Spawn(io::Error::from(io::ErrorKind::InvalidInput)));
        }

        // Both pipe pairs are born inheritable; the parent ends opt out
        // again right after, so the child only sees its own ends.
        let (forkin, input) = create_pipe()?;
        let (output, forkout) = create_pipe()?;
        clear_inherit(&input)?;
        clear_inherit(&output)?;

        let argv: Vec<String> = argv
            .iter()
            .map(|arg| arg.as_ref().to_string_lossy().into_owned())
            .collect();

        let (is_console, use_cmd) = match executable_subsystem(&argv[0]) {
            Ok(subsystem) => (subsystem == Subsystem::Console, false),
            Err(err) => {
                // Unreadable or unrecognized image; `cmd` can still
                // resolve shell builtins and scripts.
                warn!("cannot classify {}: {}; launching via cmd", argv[0], err);
                (true, true)
            }
        };

        let mut cmdline = String::new();
        if use_cmd {
            cmdline.push_str("cmd /c ");
        }
        cmdline.push_str(&build_command_line(&argv));
        let mut cmdline: Vec<u16> = cmdline.encode_utf16().chain(std::iter::once(0)).collect();

        let mut startup: STARTUPINFOW = unsafe { mem::zeroed() };
        startup.cb = mem::size_of::<STARTUPINFOW>() as u32;
        startup.dwFlags = STARTF_USESTDHANDLES;
        startup.hStdInput = forkin.as_raw_handle() as HANDLE;
        startup.hStdOutput = forkout.as_raw_handle() as HANDLE;
        // child's stderr is always redirected to the stdout pipe
        startup.hStdError = forkout.as_raw_handle() as HANDLE;
        if is_console {
            startup.dwFlags |= STARTF_USESHOWWINDOW;
            startup.wShowWindow = SW_HIDE as u16;
        }

        // A console of its own makes closing easier. CREATE_NEW_PROCESS_GROUP
        // must stay out: it disables Ctrl-C in that console.
        let mut proc_info: PROCESS_INFORMATION = unsafe { mem::zeroed() };
        let ok = unsafe {
            CreateProcessW(
                ptr::null(),
                cmdline.as_mut_ptr(),
                ptr::null(),
                ptr::null(),
                TRUE,
                CREATE_NEW_CONSOLE,
                ptr::null(),
                ptr::null(),
                &startup,
                &mut proc_info,
            )
        };
        if ok == 0 {
            return Err(Error::Spawn(io::Error::last_os_error()));
        }

        // The child holds its pipe ends now; ours are dropped here.
        drop(forkin);
        drop(forkout);

        Ok(Self {
            process: unsafe { OwnedHandle::from_raw_handle(proc_info.hProcess as RawHandle) },
            thread: unsafe { OwnedHandle::from_raw_handle(proc_info.hThread as RawHandle) },
            pid: proc_info.dwProcessId,
            input: Some(input),
            output: Some(output),
        })
    }

    /// Returns a pid of a child process.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// A file over the pipe carrying the child's stdout and stderr.
    pub fn reader(&self) -> Result<File> {
        let handle = self.output()?.try_clone().map_err(Error::Io)?;
        Ok(File::from(handle))
    }

    /// A file over the pipe feeding the child's stdin.
    pub fn writer(&self) -> Result<File> {
        let handle = self.input()?.try_clone().map_err(Error::Io)?;
        Ok(File::from(handle))
    }

    /// The raw pipe handle carrying the child's output, for
    /// [`crate::poll::poll`].
    pub fn output_handle(&self) -> Result<RawHandle> {
        Ok(self.output()?.as_raw_handle())
    }

    /// Exit code of the child if it finished already.
    pub fn status(&self) -> Result<Option<u32>> {
        let mut code: u32 = 0;
        let ok = unsafe { GetExitCodeProcess(self.process.as_raw_handle() as HANDLE, &mut code) };
        if ok == 0 {
            return Err(Error::Wait(io::Error::last_os_error()));
        }
        if code == STILL_ACTIVE as u32 {
            Ok(None)
        } else {
            Ok(Some(code))
        }
    }

    /// Interrupt the child, as if Ctrl-C was typed in its console.
    ///
    /// Process ids are recycled once released, so a child known to be
    /// finished is left alone.
    pub fn interrupt(&self) -> Result<()> {
        match self.status()? {
            Some(_) => Ok(()),
            None => interrupt_pid(self.pid),
        }
    }

    /// Stop the child for good.
    ///
    /// The pipe ends are closed first, so a reader of ours does not
    /// block on a dead process.
    pub fn terminate(&mut self) -> Result<()> {
        drop(self.input.take());
        drop(self.output.take());

        let ok = unsafe { TerminateProcess(self.process.as_raw_handle() as HANDLE, 1) };
        if ok == 0 {
            return Err(Error::Signal(io::Error::last_os_error()));
        }
        Ok(())
    }

    /// Wait blocks until the child exits and returns its exit code.
    pub fn wait(&self) -> Result<u32> {
        let handle = self.process.as_raw_handle() as HANDLE;
        if unsafe { WaitForSingleObject(handle, INFINITE) } != WAIT_OBJECT_0 {
            return Err(Error::Wait(io::Error::last_os_error()));
        }

        let mut code: u32 = 0;
        if unsafe { GetExitCodeProcess(handle, &mut code) } == 0 {
            return Err(Error::Wait(io::Error::last_os_error()));
        }
        Ok(code)
    }

    fn input(&self) -> Result<&OwnedHandle> {
        self.input
            .as_ref()
            .ok_or_else(|| Error::Io(io::Error::from(io::ErrorKind::BrokenPipe)))
    }

    fn output(&self) -> Result<&OwnedHandle> {
        self.output
            .as_ref()
            .ok_or_else(|| Error::Io(io::Error::from(io::ErrorKind::BrokenPipe)))
    }
}

// The process and thread handles close on drop; a still running child
// keeps running, like a detached std::process::Child would.

fn create_pipe() -> Result<(OwnedHandle, OwnedHandle)> {
    let mut attrs = SECURITY_ATTRIBUTES {
        nLength: mem::size_of::<SECURITY_ATTRIBUTES>() as u32,
        lpSecurityDescriptor: ptr::null_mut(),
        bInheritHandle: TRUE,
    };

    let mut read: HANDLE = ptr::null_mut();
    let mut write: HANDLE = ptr::null_mut();
    let ok = unsafe { CreatePipe(&mut read, &mut write, &mut attrs, 0) };
    if ok == 0 {
        return Err(Error::Setup(io::Error::last_os_error()));
    }

    Ok(unsafe {
        (
            OwnedHandle::from_raw_handle(read as RawHandle),
            OwnedHandle::from_raw_handle(write as RawHandle),
        )
    })
}

fn clear_inherit(handle: &OwnedHandle) -> Result<()> {
    let ok = unsafe {
        SetHandleInformation(handle.as_raw_handle() as HANDLE, HANDLE_FLAG_INHERIT, 0)
    };
    if ok == 0 {
        return Err(Error::Setup(io::Error::last_os_error()));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subsystem {
    Console,
    Gui,
}

/// Classifies the executable by the `Subsystem` field of its PE
/// optional header.
fn executable_subsystem(exe: &str) -> io::Result<Subsystem> {
    // The program may arrive pre-quoted.
    let exe = exe.trim_matches('"');

    let mut file = fs::File::open(exe)?;

    let mut dos_header = [0u8; 64];
    file.read_exact(&mut dos_header)?;
    if u16::from_le_bytes([dos_header[0], dos_header[1]]) != IMAGE_DOS_SIGNATURE {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "no MZ header"));
    }
    let e_lfanew = u32::from_le_bytes([
        dos_header[60],
        dos_header[61],
        dos_header[62],
        dos_header[63],
    ]);

    file.seek(SeekFrom::Start(u64::from(e_lfanew)))?;
    let mut signature = [0u8; 4];
    file.read_exact(&mut signature)?;
    if u32::from_le_bytes(signature) != IMAGE_NT_SIGNATURE {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "no NT signature"));
    }

    // Past the 20 byte file header; `Subsystem` sits at offset 68 of
    // the optional header for both PE32 and PE32+.
    file.seek(SeekFrom::Current(20 + 68))?;
    let mut subsystem = [0u8; 2];
    file.read_exact(&mut subsystem)?;
    let subsystem = u16::from_le_bytes(subsystem);

    match subsystem {
        IMAGE_SUBSYSTEM_WINDOWS_CUI | IMAGE_SUBSYSTEM_OS2_CUI | IMAGE_SUBSYSTEM_POSIX_CUI => {
            Ok(Subsystem::Console)
        }
        IMAGE_SUBSYSTEM_UNKNOWN | IMAGE_SUBSYSTEM_NATIVE => {
            // A GUI guess only costs a spurious console window if wrong;
            // a console guess would swallow the program's windows.
            warn!("{}: subsystem {} treated as GUI", exe, subsystem);
            Ok(Subsystem::Gui)
        }
        _ => Ok(Subsystem::Gui),
    }
}

struct ConsoleSearch {
    pid: u32,
    hwnd: HWND,
}

unsafe extern "system" fn find_child_console(hwnd: HWND, lparam: LPARAM) -> i32 {
    let search = &mut *(lparam as *mut ConsoleSearch);

    let mut process_id: u32 = 0;
    GetWindowThreadProcessId(hwnd, &mut process_id);
    if process_id == search.pid {
        let mut class = [0u16; 32];
        let len = GetClassNameW(hwnd, class.as_mut_ptr(), class.len() as i32);
        if len > 0 && String::from_utf16_lossy(&class[..len as usize]) == "ConsoleWindowClass" {
            search.hwnd = hwnd;
            return FALSE;
        }
    }
    // keep looking
    TRUE
}

/// Interrupt the process `pid` as if Ctrl-C was typed in its console.
///
/// The console window of the process is located and briefly brought to
/// the foreground to receive synthesized Ctrl-C keystrokes; without a
/// console window, Ctrl-Break (the NT equivalent of SIGINT) is posted
/// instead.
pub fn interrupt_pid(pid: u32) -> Result<()> {
    let mut search = ConsoleSearch {
        pid,
        hwnd: ptr::null_mut(),
    };
    unsafe { EnumWindows(Some(find_child_console), &mut search as *mut _ as LPARAM) };

    if !search.hwnd.is_null() {
        unsafe { send_ctrl_c(search.hwnd) };
        return Ok(());
    }

    if unsafe { GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pid) } == 0 {
        return Err(Error::Signal(io::Error::last_os_error()));
    }
    Ok(())
}

unsafe fn send_ctrl_c(console: HWND) {
    let control_scan = MapVirtualKeyW(u32::from(VK_CONTROL), MAPVK_VK_TO_VSC) as u8;
    let break_key = b'C';
    let break_scan = MapVirtualKeyW(u32::from(break_key), MAPVK_VK_TO_VSC) as u8;

    let foreground = GetForegroundWindow();
    if foreground.is_null() {
        return;
    }

    // Only the thread owning the foreground window may hand the
    // foreground over, so attach our input to it (and to the console's
    // thread) for the duration of the switch.
    let current = GetCurrentThreadId();

    let mut foreground_thread = GetWindowThreadProcessId(foreground, ptr::null_mut());
    if foreground_thread == current || AttachThreadInput(current, foreground_thread, TRUE) == 0 {
        foreground_thread = 0;
    }

    let mut console_thread = GetWindowThreadProcessId(console, ptr::null_mut());
    if console_thread == current || AttachThreadInput(current, console_thread, TRUE) == 0 {
        console_thread = 0;
    }

    if SetForegroundWindow(console) != 0 {
        // Keystrokes as if the user had typed Ctrl-C.
        keybd_event(VK_CONTROL as u8, control_scan, 0, 0);
        keybd_event(break_key, break_scan, 0, 0);
        keybd_event(break_key, break_scan, KEYEVENTF_KEYUP, 0);
        keybd_event(VK_CONTROL as u8, control_scan, KEYEVENTF_KEYUP, 0);

        // Give the console time to react to the focus change before
        // the previous window takes the foreground back.
        Sleep(100);

        SetForegroundWindow(foreground);
    }

    if foreground_thread != 0 {
        AttachThreadInput(current, foreground_thread, FALSE);
    }
    if console_thread != 0 {
        AttachThreadInput(current, console_thread, FALSE);
    }
}
