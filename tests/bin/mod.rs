mod gltf_conformance_test;
