use std::ffi::c_void;

use ash::vk;

///Forwards validation layer messages to the log crate.
unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    #[allow(unused)] message_types: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        #[cfg(feature = "logging")]
        log::error!("Validation layer sent a message without data");
        return vk::FALSE;
    }

    #[cfg(feature = "logging")]
    {
        let data = unsafe { &*p_callback_data };
        let id = unsafe { data.message_id_name_as_c_str() }.unwrap_or(c"unknown id");
        let msg = unsafe { data.message_as_c_str() }.unwrap_or(c"no message");

        if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            log::error!("[{}: {:?}]: {:?}", data.message_id_number, id, msg);
        } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            log::warn!("[{}: {:?}]: {:?}", data.message_id_number, id, msg);
        } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            log::info!("[{}: {:?}]: {:?}", data.message_id_number, id, msg);
        } else {
            log::trace!("[{}: {:?}]: {:?}", data.message_id_number, id, msg);
        }
    }

    #[cfg(not(feature = "logging"))]
    {
        let _ = message_severity;
    }

    vk::FALSE
}

///Owns the debug messenger of an instance with enabled validation layer.
pub(crate) struct Debugger {
    debug_instance: ash::ext::debug_utils::Instance,
    debug_messenger: vk::DebugUtilsMessengerEXT,
}

impl Debugger {
    pub(crate) fn new(entry: &ash::Entry, instance: &ash::Instance) -> Result<Self, vk::Result> {
        let debug_instance = ash::ext::debug_utils::Instance::new(entry, instance);
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vulkan_debug_callback));

        let debug_messenger =
            unsafe { debug_instance.create_debug_utils_messenger(&create_info, None)? };

        Ok(Debugger {
            debug_instance,
            debug_messenger,
        })
    }
}

impl Drop for Debugger {
    fn drop(&mut self) {
        unsafe {
            self.debug_instance
                .destroy_debug_utils_messenger(self.debug_messenger, None)
        };
    }
}
