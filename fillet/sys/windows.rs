use winapi::shared::minwindef::{DWORD, FILETIME, MAX_PATH};
use winapi::um::fileapi::{GetDiskFreeSpaceExW, GetVolumePathNameW};
use winapi::um::ioapiset::DeviceIoControl;
use winapi::um::processthreadsapi::{GetCurrentProcess, GetProcessTimes};
use winapi::um::psapi::{GetProcessMemoryInfo, PROCESS_MEMORY_COUNTERS};
use winapi::um::winioctl::FSCTL_SET_SPARSE;
use winapi::um::winnt::ULARGE_INTEGER;

use std::ffi::OsStr;
use std::fs::File;
use std::io;
use std::mem;
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::AsRawHandle;
use std::path::Path;
use std::ptr;
use std::time::Duration;

fn to_wide(s: &OsStr) -> Vec<u16> {
    s.encode_wide().chain(Some(0)).collect()
}

fn filetime_to_duration(ft: &FILETIME) -> Duration {
    let ticks = ((ft.dwHighDateTime as u64) << 32) | ft.dwLowDateTime as u64;
    Duration::from_nanos(ticks * 100)
}

pub fn cpu_time() -> Option<Duration> {
    unsafe {
        let mut creation: FILETIME = mem::zeroed();
        let mut exit: FILETIME = mem::zeroed();
        let mut kernel: FILETIME = mem::zeroed();
        let mut user: FILETIME = mem::zeroed();
        let ok = GetProcessTimes(
            GetCurrentProcess(),
            &mut creation,
            &mut exit,
            &mut kernel,
            &mut user,
        );
        if ok == 0 {
            return None;
        }
        Some(filetime_to_duration(&kernel) + filetime_to_duration(&user))
    }
}

pub fn resident_memory() -> Option<u64> {
    unsafe {
        let mut counters: PROCESS_MEMORY_COUNTERS = mem::zeroed();
        let size = mem::size_of::<PROCESS_MEMORY_COUNTERS>() as DWORD;
        if GetProcessMemoryInfo(GetCurrentProcess(), &mut counters, size) == 0 {
            return None;
        }
        Some(counters.WorkingSetSize as u64)
    }
}

pub fn storage_id(dir: &Path) -> io::Result<String> {
    let wide = to_wide(dir.as_os_str());
    let mut volume = vec![0u16; MAX_PATH + 1];
    let ok = unsafe { GetVolumePathNameW(wide.as_ptr(), volume.as_mut_ptr(), volume.len() as DWORD) };
    if ok == 0 {
        return Err(io::Error::last_os_error());
    }
    let len = volume.iter().position(|&c| c == 0).unwrap_or(volume.len());
    Ok(format!("volume {}", String::from_utf16_lossy(&volume[..len])))
}

pub fn free_space(dir: &Path) -> io::Result<u64> {
    let wide = to_wide(dir.as_os_str());
    unsafe {
        let mut available: ULARGE_INTEGER = mem::zeroed();
        let ok = GetDiskFreeSpaceExW(
            wide.as_ptr(),
            &mut available,
            ptr::null_mut(),
            ptr::null_mut(),
        );
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(*available.QuadPart())
    }
}

pub fn enable_sparse(file: &File) -> io::Result<()> {
    let mut returned: DWORD = 0;
    let ok = unsafe {
        DeviceIoControl(
            file.as_raw_handle() as _,
            FSCTL_SET_SPARSE,
            ptr::null_mut(),
            0,
            ptr::null_mut(),
            0,
            &mut returned,
            ptr::null_mut(),
        )
    };
    match ok {
        0 => Err(io::Error::last_os_error()),
        _ => Ok(()),
    }
}

pub fn preallocate(file: &File, len: u64) -> io::Result<()> {
    if file.metadata()?.len() < len {
        file.set_len(len)?;
    }
    Ok(())
}
