//! Catalogue of foreign symbols that are safe to call from the collectible state.
//!
//! Every entry is a routine that neither blocks nor calls back into managed
//! code, so skipping the native-state transition around it cannot hide
//! references from the collector. Names are matched exactly, including
//! platform decorations (`\x01` prefixes, C++ and Swift mangling,
//! Objective-C selector syntax).

/// Known-safe foreign symbol names. Unsorted; [`crate::oracle::SafetyOracle`]
/// sorts a per-thread copy.
pub const SAFE_FOREIGN_FUNCTIONS: &[&str] = &[
    // Darwin syscall wrappers.
    "\x01_close",
    "\x01_mprotect",
    // C++ runtime and exception machinery.
    "_ZL15_objc_terminatev",
    "_ZNSt13exception_ptrC1ERKS_",
    "_ZNSt13exception_ptrD1Ev",
    "_ZNSt3__112__next_primeEm",
    "_ZNSt3__112basic_stringIcNS_11char_traitsIcEENS_9allocatorIcEEED1Ev",
    "_ZNSt3__16chrono12steady_clock3nowEv",
    "_ZNSt3__19to_stringEi",
    "_ZNSt9exceptionD2Ev",
    "_ZSt17current_exceptionv",
    "_ZSt17rethrow_exceptionSt13exception_ptr",
    "_ZSt9terminatev",
    "__cxa_allocate_exception",
    "__cxa_begin_catch",
    "__cxa_end_catch",
    "__cxa_throw",
    "__memset_chk",
    // libc: allocation, math, strings, process exit.
    "abort",
    "acos",
    "acosf",
    "acosh",
    "acoshf",
    "asin",
    "asinf",
    "asinh",
    "asinhf",
    "atan",
    "atan2",
    "atan2f",
    "atanf",
    "atanh",
    "atanhf",
    "calloc",
    "clock_gettime",
    "cosh",
    "coshf",
    "exit",
    "expm1",
    "expm1f",
    "free",
    "hypot",
    "hypotf",
    "log1p",
    "log1pf",
    "malloc",
    "memcmp",
    "memmem",
    "nextafter",
    "nextafterf",
    "remainder",
    "remainderf",
    "sinh",
    "sinhf",
    "strcmp",
    "strlen",
    "tan",
    "tanf",
    "tanh",
    "tanhf",
    "vsnprintf",
    // Threading primitives.
    "dispatch_once",
    "\x01_pthread_cond_init",
    "_pthread_cond_init",
    "pthread_cond_destroy",
    "pthread_cond_signal",
    "pthread_equal",
    "pthread_main_np",
    "pthread_mutex_destroy",
    "pthread_mutex_init",
    "pthread_mutex_unlock",
    "pthread_self",
    // Objective-C runtime and Foundation.
    "+[NSError errorWithDomain:code:userInfo:]",
    "+[NSMethodSignature signatureWithObjCTypes:]",
    "+[NSNull null]",
    "+[NSObject class]",
    "+[NSObject new]",
    "+[NSString stringWithUTF8String:]",
    "+[NSValue valueWithPointer:]",
    "-[NSDictionary objectForKeyedSubscript:]",
    "-[NSError localizedDescription]",
    "-[NSError userInfo]",
    "-[NSMethodSignature getArgumentTypeAtIndex:]",
    "-[NSMethodSignature methodReturnType]",
    "-[NSMethodSignature numberOfArguments]",
    "-[NSObject init]",
    "-[NSPlaceholderString initWithBytes:length:encoding:]",
    "-[NSPlaceholderString initWithBytesNoCopy:length:encoding:freeWhenDone:]",
    "-[NSValue pointerValue]",
    "-[__NSArrayI count]",
    "-[__NSArrayI objectAtIndex:]",
    "-[__NSCFNumber doubleValue]",
    "-[__NSCFNumber floatValue]",
    "-[__NSCFNumber intValue]",
    "-[__NSCFNumber longLongValue]",
    "-[__NSCFNumber objCType]",
    "-[__NSCFString isEqual:]",
    "-[__NSDictionaryM setObject:forKeyedSubscript:]",
    "-[__NSFrozenDictionaryM objectForKeyedSubscript:]",
    "-[__SwiftNativeNSError userInfo]",
    "CFStringCreateCopy",
    "CFStringGetCharacters",
    "CFStringGetLength",
    "class_addMethod",
    "class_addProtocol",
    "class_copyMethodList",
    "class_copyProtocolList",
    "class_getClassMethod",
    "class_getName",
    "class_getSuperclass",
    "method_getName",
    "method_getTypeEncoding",
    "objc_alloc",
    "objc_allocateClassPair",
    "objc_autorelease",
    "objc_autoreleasePoolPush",
    "objc_autoreleaseReturnValue",
    "objc_getAssociatedObject",
    "objc_getClass",
    "objc_getProtocol",
    "objc_registerClassPair",
    "objc_retain",
    "objc_retainAutoreleaseReturnValue",
    "objc_retainBlock",
    "objc_setAssociatedObject",
    "object_getClass",
    "protocol_copyProtocolList",
    "protocol_getName",
    "sel_registerName",
    // Swift bridging thunks.
    "$ss23_ContiguousArrayStorageC5countSivgTo",
    "$sSo12KtKotlinUnitCSgs5Error_pSgIeggg_ACSo7NSErrorCSgIeyByy_TR",
    "$sSo5KtIntCSgs5Error_pSgIeggg_ACSo7NSErrorCSgIeyByy_TR",
    "$ss22__SwiftDeferredNSArrayC5countSivgTo",
    "$ss23_ContiguousArrayStorageC8objectAtys9UnmanagedVyyXlGSiFTo",
    "$ss41__SwiftNativeNSArrayWithContiguousStorageC8objectAtys9UnmanagedVyyXlGSiFTo",
    "$ss26__EmptyDictionarySingletonC5countSivgTo",
    "$ss26_SwiftDeferredNSDictionaryC5countSivgTo",
    "$ss26_SwiftDeferredNSDictionaryC13keyEnumerators13_NSEnumerator_pyFTo",
    "$ss28_SwiftDictionaryNSEnumeratorC10nextObjectyXlSgyFTo",
    "$sypSgs5Error_pSgIegng_yXlSgSo7NSErrorCSgIeyByy_TR",
];
