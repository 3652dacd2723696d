//! User-space pointer validation and copying.
//!
//! Shaped around the familiar copy_from_user/copy_to_user/
//! copy_string_from_user/validate_user_* split, with the single-range
//! `KERNEL_BASE` check replaced by a lookup against the calling thread's
//! `MpuBank`: a user pointer is only valid if some slot in the bank
//! covers the whole range with the right access rights.

use crate::lib::error::{Errno, Result};
use crate::mm::mpu::AccessRights;
use crate::sched::scheduler;
use core::ptr;

fn check_range(addr: usize, len: usize, rights: AccessRights) -> Result<()> {
    let end = addr.checked_add(len).ok_or(Errno::EFAULT)?;
    let tid = scheduler::current_thread_id();
    let covered = scheduler::with_thread(tid, |t| t.mpu_bank.check_access(addr, end - addr, rights))
        .unwrap_or(false);
    if covered {
        Ok(())
    } else {
        Err(Errno::EFAULT)
    }
}

pub fn validate_user_read(ptr: *const u8, len: usize) -> Result<()> {
    check_range(ptr as usize, len, AccessRights::READ | AccessRights::USER)
}

pub fn validate_user_write(ptr: *mut u8, len: usize) -> Result<()> {
    check_range(ptr as usize, len, AccessRights::READ | AccessRights::WRITE | AccessRights::USER)
}

pub fn copy_from_user<T: Copy>(user_ptr: *const T, count: usize) -> Result<alloc::vec::Vec<T>> {
    let total_size = count.checked_mul(core::mem::size_of::<T>()).ok_or(Errno::EINVAL)?;
    validate_user_read(user_ptr as *const u8, total_size)?;
    if count == 0 {
        return Ok(alloc::vec::Vec::new());
    }
    let mut buf = alloc::vec::Vec::with_capacity(count);
    unsafe {
        ptr::copy_nonoverlapping(user_ptr, buf.as_mut_ptr(), count);
        buf.set_len(count);
    }
    Ok(buf)
}

pub fn copy_to_user<T: Copy>(user_ptr: *mut T, data: &[T]) -> Result<()> {
    let total_size = data.len() * core::mem::size_of::<T>();
    validate_user_write(user_ptr as *mut u8, total_size)?;
    if data.is_empty() {
        return Ok(());
    }
    unsafe { ptr::copy_nonoverlapping(data.as_ptr(), user_ptr, data.len()) };
    Ok(())
}

pub fn copy_string_from_user(user_ptr: *const u8, max_len: usize) -> Result<alloc::string::String> {
    validate_user_read(user_ptr, max_len)?;
    let mut bytes = alloc::vec::Vec::new();
    unsafe {
        for i in 0..max_len {
            let byte = ptr::read(user_ptr.add(i));
            if byte == 0 {
                break;
            }
            bytes.push(byte);
        }
    }
    alloc::string::String::from_utf8(bytes).map_err(|_| Errno::EINVAL)
}
